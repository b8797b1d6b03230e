use crate::network::Duration;

/// Board, alight and transfer slack. Board and alight slack are looked up by a pattern's
/// slack index (typically the transit mode); the last value is used for larger indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackProvider {
    transfer_slack: Duration,
    board_slack: Vec<Duration>,
    alight_slack: Vec<Duration>,
}

impl Default for SlackProvider {
    fn default() -> Self {
        Self::uniform(0, 0, 0)
    }
}

impl SlackProvider {
    pub fn new(transfer_slack: Duration, board_slack: Vec<Duration>, alight_slack: Vec<Duration>) -> Self {
        Self { transfer_slack, board_slack, alight_slack }
    }

    pub fn uniform(transfer_slack: Duration, board_slack: Duration, alight_slack: Duration) -> Self {
        Self::new(transfer_slack, vec![board_slack], vec![alight_slack])
    }

    fn lookup(values: &[Duration], slack_index: usize) -> Duration {
        values.get(slack_index).or(values.last()).copied().unwrap_or(0)
    }

    pub fn transfer_slack(&self) -> Duration {
        self.transfer_slack
    }

    pub fn board_slack(&self, slack_index: usize) -> Duration {
        Self::lookup(&self.board_slack, slack_index)
    }

    pub fn alight_slack(&self, slack_index: usize) -> Duration {
        Self::lookup(&self.alight_slack, slack_index)
    }
}

/// Hands out request tickets so a flow can drop responses that a newer
/// request has superseded.
///
/// With discarding off every response is accepted and the last one to arrive
/// wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSequencer {
    latest: u64,
    discard_stale: bool,
}

impl RequestSequencer {
    pub fn new(discard_stale: bool) -> Self {
        Self {
            latest: 0,
            discard_stale,
        }
    }

    pub fn issue(&mut self) -> u64 {
        self.latest = self.latest.wrapping_add(1);
        self.latest
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        !self.discard_stale || ticket == self.latest
    }
}

impl Default for RequestSequencer {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::RequestSequencer;

    #[test]
    fn only_latest_ticket_is_current() {
        let mut seq = RequestSequencer::new(true);
        let first = seq.issue();
        let second = seq.issue();
        assert!(!seq.is_current(first));
        assert!(seq.is_current(second));
    }

    #[test]
    fn without_discarding_every_ticket_is_current() {
        let mut seq = RequestSequencer::new(false);
        let first = seq.issue();
        seq.issue();
        assert!(seq.is_current(first));
    }
}

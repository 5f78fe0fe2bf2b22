/// User-facing messages that interrupt the normal flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    EnterKhasraNumber,
    KhasraNotFound,
    RasterLoadFailed,
}

impl Notice {
    pub const fn text(self) -> &'static str {
        match self {
            Notice::EnterKhasraNumber => "कृपया खसरा नंबर दर्ज करें",
            Notice::KhasraNotFound => "खसरा नहीं मिला",
            Notice::RasterLoadFailed => "Failed to load raster images.",
        }
    }
}

/// The one notice on screen, tagged with a serial so a delayed dismiss
/// cannot close a notice posted after it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoticeSlot {
    current: Option<(u64, Notice)>,
    serial: u64,
}

impl NoticeSlot {
    pub fn post(&mut self, notice: Notice) -> u64 {
        self.serial += 1;
        self.current = Some((self.serial, notice));
        self.serial
    }

    pub fn dismiss(&mut self, serial: u64) {
        if self.current.is_some_and(|(s, _)| s == serial) {
            self.current = None;
        }
    }

    pub fn current(&self) -> Option<(u64, Notice)> {
        self.current
    }
}

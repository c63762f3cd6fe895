use bytes::BytesMut;

/// One elementary stream inside the program: its PID, PSI stream type
/// and the rolling continuity counter for its TS packets.
#[derive(Debug, Clone, Default)]
pub struct Pes {
    pub pid: u16,
    pub codec_id: u8,
    pub continuity_counter: u8,
    pub esinfo: BytesMut,
}

impl Pes {
    #[must_use]
    pub fn new(pid: u16, codec_id: u8, esinfo: BytesMut) -> Self {
        Self {
            pid,
            codec_id,
            continuity_counter: 0,
            esinfo,
        }
    }

    pub fn bump_continuity(&mut self) -> u8 {
        let counter = self.continuity_counter;
        self.continuity_counter = (self.continuity_counter + 1) & 0x0f;
        counter
    }
}

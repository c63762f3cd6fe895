pub mod define;
pub mod digest;
pub mod errors;

use {
    bytes::BytesMut,
    crate::bytesio::{bytes_reader::BytesReader, bytes_writer::BytesWriter},
    define::{
        DigestSchema, FMS_KEY, FMS_KEY_FIRST_HALF_LENGTH, FP_KEY, FP_KEY_FIRST_HALF_LENGTH,
        RTMP_HANDSHAKE_SIZE, RTMP_VERSION, SHA256_DIGEST_SIZE,
    },
    errors::{HandshakeError, HandshakeErrorValue},
    rand::Rng,
    std::time::{SystemTime, UNIX_EPOCH},
};

fn current_time() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u32)
        .unwrap_or(0)
}

fn fill_random(buffer: &mut [u8]) {
    let mut rng = rand::thread_rng();
    rng.fill(buffer);
}

/// One 1536-byte packet: time(4) + version(4) + 1528 payload bytes.
fn new_packet(version: [u8; 4]) -> Vec<u8> {
    let mut packet = vec![0_u8; RTMP_HANDSHAKE_SIZE];
    packet[0..4].copy_from_slice(&current_time().to_be_bytes());
    packet[4..8].copy_from_slice(&version);
    fill_random(&mut packet[8..]);
    packet
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerHandshakeState {
    ReadC0C1,
    ReadC2,
    Finish,
}

/*
 * Client                 Server
 *   |--------- C0 C1 ------->|
 *   |<-------- S0 S1 S2 -----|
 *   |--------- C2 ----------->|
 *
 * The server auto-detects the digest-signed (complex) handshake by
 * validating C1 against the Flash Player key under both schemas and
 * falls back to the plain echo handshake when neither matches.
 */
pub struct HandshakeServer {
    reader: BytesReader,
    writer: BytesWriter,
    state: ServerHandshakeState,
}

impl Default for HandshakeServer {
    fn default() -> Self {
        Self::new()
    }
}

impl HandshakeServer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            reader: BytesReader::new(BytesMut::new()),
            writer: BytesWriter::new(),
            state: ServerHandshakeState::ReadC0C1,
        }
    }

    pub fn extend_data(&mut self, data: &[u8]) -> Result<(), HandshakeError> {
        self.reader.extend_from_slice(data)?;
        Ok(())
    }

    #[must_use]
    pub const fn state(&self) -> ServerHandshakeState {
        self.state
    }

    /// Bytes to send to the peer, drained.
    pub fn extract_response(&mut self) -> BytesMut {
        self.writer.extract_current_bytes()
    }

    /// Any bytes the client pipelined after C2 (usually the connect
    /// command), drained.
    pub fn extract_remaining_bytes(&mut self) -> BytesMut {
        self.reader.extract_remaining_bytes()
    }

    /// Drives the state machine as far as buffered data allows.
    pub fn handshake(&mut self) -> Result<ServerHandshakeState, HandshakeError> {
        loop {
            match self.state {
                ServerHandshakeState::ReadC0C1 => {
                    if self.reader.len() < 1 + RTMP_HANDSHAKE_SIZE {
                        return Ok(self.state);
                    }

                    let c0 = self.reader.read_u8()?;
                    if c0 < RTMP_VERSION {
                        return Err(HandshakeError {
                            value: HandshakeErrorValue::C0VersionNotCorrect,
                        });
                    }
                    let c1 = self.reader.read_bytes(RTMP_HANDSHAKE_SIZE)?;

                    match Self::detect_schema(&c1)? {
                        Some((schema, c1_digest)) => {
                            tracing::trace!(?schema, "complex handshake detected");
                            self.write_complex_response(schema, &c1_digest)?;
                        }
                        None => {
                            tracing::trace!("simple handshake detected");
                            self.write_simple_response(&c1)?;
                        }
                    }

                    self.state = ServerHandshakeState::ReadC2;
                }
                ServerHandshakeState::ReadC2 => {
                    if self.reader.len() < RTMP_HANDSHAKE_SIZE {
                        return Ok(self.state);
                    }
                    //C2 echoes S1; tolerate clients that fill it freely
                    self.reader.read_bytes(RTMP_HANDSHAKE_SIZE)?;
                    self.state = ServerHandshakeState::Finish;
                }
                ServerHandshakeState::Finish => {
                    return Ok(self.state);
                }
            }
        }
    }

    fn detect_schema(
        c1: &[u8],
    ) -> Result<Option<(DigestSchema, [u8; SHA256_DIGEST_SIZE])>, HandshakeError> {
        //a zeroed version field marks the simple handshake
        if c1[4..8] == [0, 0, 0, 0] {
            return Ok(None);
        }

        let key = &FP_KEY[..FP_KEY_FIRST_HALF_LENGTH];
        for schema in [DigestSchema::Schema1, DigestSchema::Schema0] {
            if let Some(c1_digest) = digest::validate_digest(c1, key, schema)? {
                return Ok(Some((schema, c1_digest)));
            }
        }
        Ok(None)
    }

    fn write_simple_response(&mut self, c1: &BytesMut) -> Result<(), HandshakeError> {
        /*S0*/
        self.writer.write_u8(RTMP_VERSION)?;
        /*S1: fresh random packet*/
        let s1 = new_packet([0, 0, 0, 0]);
        self.writer.write(&s1)?;
        /*S2: echo of C1 with our receive time*/
        let mut s2 = c1.to_vec();
        s2[4..8].copy_from_slice(&current_time().to_be_bytes());
        self.writer.write(&s2)?;
        Ok(())
    }

    fn write_complex_response(
        &mut self,
        schema: DigestSchema,
        c1_digest: &[u8; SHA256_DIGEST_SIZE],
    ) -> Result<(), HandshakeError> {
        /*S0*/
        self.writer.write_u8(RTMP_VERSION)?;

        /*S1: signed under the server key, same schema as the client*/
        let mut s1 = new_packet([4, 5, 0, 1]);
        digest::sign_packet(&mut s1, &FMS_KEY[..FMS_KEY_FIRST_HALF_LENGTH], schema)?;
        self.writer.write(&s1)?;

        /*S2: random body, trailing signature keyed off the C1 digest*/
        let mut s2 = vec![0_u8; RTMP_HANDSHAKE_SIZE];
        fill_random(&mut s2[..RTMP_HANDSHAKE_SIZE - SHA256_DIGEST_SIZE]);
        let signing_key = digest::make_digest(&FMS_KEY, c1_digest)?;
        let signature =
            digest::make_digest(&signing_key, &s2[..RTMP_HANDSHAKE_SIZE - SHA256_DIGEST_SIZE])?;
        s2[RTMP_HANDSHAKE_SIZE - SHA256_DIGEST_SIZE..].copy_from_slice(&signature);
        self.writer.write(&s2)?;

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientHandshakeState {
    WriteC0C1,
    ReadS0S1S2,
    Finish,
}

/// Outbound (relay) side of the handshake; uses the simple variant,
/// which every server accepts.
pub struct HandshakeClient {
    reader: BytesReader,
    writer: BytesWriter,
    state: ClientHandshakeState,
    c1: Vec<u8>,
}

impl Default for HandshakeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HandshakeClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            reader: BytesReader::new(BytesMut::new()),
            writer: BytesWriter::new(),
            state: ClientHandshakeState::WriteC0C1,
            c1: Vec::new(),
        }
    }

    pub fn extend_data(&mut self, data: &[u8]) -> Result<(), HandshakeError> {
        self.reader.extend_from_slice(data)?;
        Ok(())
    }

    #[must_use]
    pub const fn state(&self) -> ClientHandshakeState {
        self.state
    }

    pub fn extract_response(&mut self) -> BytesMut {
        self.writer.extract_current_bytes()
    }

    pub fn extract_remaining_bytes(&mut self) -> BytesMut {
        self.reader.extract_remaining_bytes()
    }

    pub fn handshake(&mut self) -> Result<ClientHandshakeState, HandshakeError> {
        loop {
            match self.state {
                ClientHandshakeState::WriteC0C1 => {
                    self.writer.write_u8(RTMP_VERSION)?;
                    self.c1 = new_packet([0, 0, 0, 0]);
                    let c1 = self.c1.clone();
                    self.writer.write(&c1)?;
                    self.state = ClientHandshakeState::ReadS0S1S2;
                    return Ok(self.state);
                }
                ClientHandshakeState::ReadS0S1S2 => {
                    if self.reader.len() < 1 + 2 * RTMP_HANDSHAKE_SIZE {
                        return Ok(self.state);
                    }

                    let s0 = self.reader.read_u8()?;
                    if s0 < RTMP_VERSION {
                        return Err(HandshakeError {
                            value: HandshakeErrorValue::S0VersionNotCorrect,
                        });
                    }
                    let s1 = self.reader.read_bytes(RTMP_HANDSHAKE_SIZE)?;
                    /*S2: tolerated, not validated*/
                    self.reader.read_bytes(RTMP_HANDSHAKE_SIZE)?;

                    /*C2: echo of S1 with our receive time*/
                    let mut c2 = s1.to_vec();
                    c2[4..8].copy_from_slice(&current_time().to_be_bytes());
                    self.writer.write(&c2)?;

                    self.state = ClientHandshakeState::Finish;
                    return Ok(self.state);
                }
                ClientHandshakeState::Finish => {
                    return Ok(self.state);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_handshake_end_to_end() {
        let mut client = HandshakeClient::new();
        let mut server = HandshakeServer::new();

        client.handshake().unwrap();
        let c0c1 = client.extract_response();
        assert_eq!(c0c1.len(), 1 + RTMP_HANDSHAKE_SIZE);

        server.extend_data(&c0c1).unwrap();
        server.handshake().unwrap();
        assert_eq!(server.state(), ServerHandshakeState::ReadC2);
        let s0s1s2 = server.extract_response();
        assert_eq!(s0s1s2.len(), 1 + 2 * RTMP_HANDSHAKE_SIZE);

        client.extend_data(&s0s1s2).unwrap();
        client.handshake().unwrap();
        assert_eq!(client.state(), ClientHandshakeState::Finish);
        let c2 = client.extract_response();

        server.extend_data(&c2).unwrap();
        server.handshake().unwrap();
        assert_eq!(server.state(), ServerHandshakeState::Finish);
    }

    #[test]
    fn test_complex_c1_detected_and_answered() {
        //build a digest-signed C1 the way Flash Player does
        let mut c1 = new_packet([0x80, 0x00, 0x07, 0x02]);
        digest::sign_packet(
            &mut c1,
            &FP_KEY[..FP_KEY_FIRST_HALF_LENGTH],
            DigestSchema::Schema1,
        )
        .unwrap();

        let mut server = HandshakeServer::new();
        let mut c0c1 = vec![RTMP_VERSION];
        c0c1.extend_from_slice(&c1);
        server.extend_data(&c0c1).unwrap();
        server.handshake().unwrap();

        let response = server.extract_response();
        assert_eq!(response.len(), 1 + 2 * RTMP_HANDSHAKE_SIZE);

        //S1 must carry a valid server-key digest under the same schema
        let s1 = &response[1..1 + RTMP_HANDSHAKE_SIZE];
        let validated = digest::validate_digest(
            s1,
            &FMS_KEY[..FMS_KEY_FIRST_HALF_LENGTH],
            DigestSchema::Schema1,
        )
        .unwrap();
        assert!(validated.is_some());
    }

    #[test]
    fn test_c0_below_version_3_is_fatal() {
        let mut server = HandshakeServer::new();
        let mut c0c1 = vec![2_u8];
        c0c1.extend_from_slice(&vec![0_u8; RTMP_HANDSHAKE_SIZE]);
        server.extend_data(&c0c1).unwrap();
        let result = server.handshake();
        assert!(matches!(
            result.unwrap_err().value,
            HandshakeErrorValue::C0VersionNotCorrect
        ));
    }

    #[test]
    fn test_partial_c0c1_waits_for_more_data() {
        let mut server = HandshakeServer::new();
        server.extend_data(&[RTMP_VERSION; 100]).unwrap();
        let state = server.handshake().unwrap();
        assert_eq!(state, ServerHandshakeState::ReadC0C1);
    }
}

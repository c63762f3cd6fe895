use {
    super::define::{DigestSchema, DIGEST_OFFSET_MODULO, SHA256_DIGEST_SIZE},
    super::errors::{DigestError, DigestErrorValue},
    hmac::{Hmac, Mac},
    sha2::Sha256,
};

type HmacSha256 = Hmac<Sha256>;

pub fn make_digest(key: &[u8], data: &[u8]) -> Result<[u8; SHA256_DIGEST_SIZE], DigestError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| DigestError {
        value: DigestErrorValue::HmacInitError,
    })?;
    mac.update(data);

    let result = mac.finalize().into_bytes();
    let mut digest = [0_u8; SHA256_DIGEST_SIZE];
    digest.copy_from_slice(&result);
    Ok(digest)
}

/// Absolute position of the 32-byte digest inside a 1536-byte packet
/// for the given schema.
#[must_use]
pub fn digest_position(packet: &[u8], schema: DigestSchema) -> usize {
    let block_start = schema.block_start();
    let offset = packet[block_start] as usize
        + packet[block_start + 1] as usize
        + packet[block_start + 2] as usize
        + packet[block_start + 3] as usize;
    block_start + 4 + (offset % DIGEST_OFFSET_MODULO)
}

/// The packet bytes with the digest slot cut out; this is the message
/// the digest signs.
#[must_use]
pub fn message_without_digest(packet: &[u8], digest_pos: usize) -> Vec<u8> {
    let mut message = Vec::with_capacity(packet.len() - SHA256_DIGEST_SIZE);
    message.extend_from_slice(&packet[..digest_pos]);
    message.extend_from_slice(&packet[digest_pos + SHA256_DIGEST_SIZE..]);
    message
}

/// Validates the digest for one schema; returns the digest bytes when
/// the packet was signed under that schema.
pub fn validate_digest(
    packet: &[u8],
    key: &[u8],
    schema: DigestSchema,
) -> Result<Option<[u8; SHA256_DIGEST_SIZE]>, DigestError> {
    let digest_pos = digest_position(packet, schema);
    if digest_pos + SHA256_DIGEST_SIZE > packet.len() {
        return Err(DigestError {
            value: DigestErrorValue::DigestLengthNotCorrect,
        });
    }

    let message = message_without_digest(packet, digest_pos);
    let expected = make_digest(key, &message)?;

    if expected == packet[digest_pos..digest_pos + SHA256_DIGEST_SIZE] {
        Ok(Some(expected))
    } else {
        Ok(None)
    }
}

/// Computes and installs the digest into the packet's digest slot.
pub fn sign_packet(
    packet: &mut [u8],
    key: &[u8],
    schema: DigestSchema,
) -> Result<[u8; SHA256_DIGEST_SIZE], DigestError> {
    let digest_pos = digest_position(packet, schema);
    let message = message_without_digest(packet, digest_pos);
    let digest = make_digest(key, &message)?;
    packet[digest_pos..digest_pos + SHA256_DIGEST_SIZE].copy_from_slice(&digest);
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::super::define::{FP_KEY, FP_KEY_FIRST_HALF_LENGTH, RTMP_HANDSHAKE_SIZE};
    use super::*;

    #[test]
    fn test_sign_then_validate() {
        let mut packet = vec![0_u8; RTMP_HANDSHAKE_SIZE];
        for (i, byte) in packet.iter_mut().enumerate() {
            *byte = (i % 251) as u8;
        }

        let key = &FP_KEY[..FP_KEY_FIRST_HALF_LENGTH];
        let signed = sign_packet(&mut packet, key, DigestSchema::Schema1).unwrap();

        let validated = validate_digest(&packet, key, DigestSchema::Schema1).unwrap();
        assert_eq!(validated, Some(signed));
        //the other schema does not validate
        assert_eq!(
            validate_digest(&packet, key, DigestSchema::Schema0).unwrap(),
            None
        );
    }

    #[test]
    fn test_digest_position_in_range() {
        let mut packet = vec![0xFF_u8; RTMP_HANDSHAKE_SIZE];
        packet[8] = 0xFF;
        let position = digest_position(&packet, DigestSchema::Schema0);
        assert!(position + SHA256_DIGEST_SIZE <= 8 + 764);
    }
}

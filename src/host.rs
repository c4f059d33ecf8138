//! Host announcements carried in transaction arbitrary data

use crate::constants::*;
use crate::encoding::decode;
use crate::types::*;
use tracing::debug;

/// Decode a host announcement from arbitrary data.
///
/// The data must be longer than the 8-byte little-endian tag, the tag must be
/// [`HOST_ANNOUNCEMENT_TAG`], and the remainder must decode as a
/// [`HostAnnouncement`]. Anything else is not an announcement.
pub fn parse_host_announcement(arbitrary_data: &[u8]) -> Option<HostAnnouncement> {
    if arbitrary_data.len() <= ARBITRARY_DATA_TAG_LEN {
        return None;
    }
    let (tag_bytes, payload) = arbitrary_data.split_at(ARBITRARY_DATA_TAG_LEN);
    let mut tag = [0u8; ARBITRARY_DATA_TAG_LEN];
    tag.copy_from_slice(tag_bytes);
    if u64::from_le_bytes(tag) != HOST_ANNOUNCEMENT_TAG {
        return None;
    }
    decode(payload).ok()
}

/// Encode an announcement the way [`parse_host_announcement`] expects it.
pub fn encode_host_announcement(announcement: &HostAnnouncement) -> crate::error::Result<Vec<u8>> {
    let mut data = HOST_ANNOUNCEMENT_TAG.to_le_bytes().to_vec();
    data.extend(crate::encoding::encode(announcement)?);
    Ok(data)
}

/// Build the host record an announcement in `tx` earns at `height`.
///
/// Returns `None` when the announced spend conditions do not lock the frozen
/// output, the freeze index is out of range, or the frozen value
/// `(time_lock - height) * value` is not positive.
pub fn host_from_announcement(
    tx: &Transaction,
    announcement: &HostAnnouncement,
    height: Height,
) -> Option<Host> {
    let frozen = usize::try_from(announcement.freeze_index)
        .ok()
        .and_then(|index| tx.outputs.get(index))?;

    let address = announcement.spend_conditions.address().ok()?;
    if address != frozen.spend_hash {
        debug!(freeze_index = announcement.freeze_index, "host announcement spend conditions do not match");
        return None;
    }

    let blocks_frozen = announcement.spend_conditions.time_lock.checked_sub(height).unwrap_or(0);
    let freeze = frozen.value.checked_mul(blocks_frozen as u128).ok()?;
    if freeze.is_zero() {
        debug!(time_lock = announcement.spend_conditions.time_lock, height, "host announcement has no frozen value");
        return None;
    }

    Some(Host {
        ip_address: String::from_utf8_lossy(&announcement.ip_address).into_owned(),
        min_size: announcement.min_filesize,
        max_size: announcement.max_filesize,
        duration: announcement.max_duration,
        frequency: announcement.max_challenge_frequency,
        tolerance: announcement.min_tolerance,
        price: announcement.price,
        burn: announcement.burn,
        freeze,
        coin_address: announcement.coin_address,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::Currency;

    fn announcement(time_lock: Height) -> HostAnnouncement {
        HostAnnouncement {
            ip_address: b"192.0.2.10:9982".to_vec(),
            max_filesize: 1 << 30,
            max_duration: 1000,
            max_challenge_frequency: 20,
            price: Currency::new(4),
            burn: Currency::new(2),
            coin_address: Address([7; 32]),
            spend_conditions: SpendConditions {
                time_lock,
                ..Default::default()
            },
            freeze_index: 0,
            ..Default::default()
        }
    }

    fn freezing_transaction(announcement: &HostAnnouncement, value: u64) -> Transaction {
        Transaction {
            outputs: vec![Output {
                value: Currency::from(value),
                spend_hash: announcement.spend_conditions.address().unwrap(),
            }],
            arbitrary_data: encode_host_announcement(announcement).unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_round_trip() {
        let ha = announcement(50);
        let data = encode_host_announcement(&ha).unwrap();
        assert_eq!(parse_host_announcement(&data), Some(ha));
    }

    #[test]
    fn test_parse_rejects_other_tags_and_short_data() {
        let ha = announcement(50);
        let mut data = encode_host_announcement(&ha).unwrap();
        data[0] = 2;
        assert_eq!(parse_host_announcement(&data), None);
        assert_eq!(parse_host_announcement(&1u64.to_le_bytes()), None);
        assert_eq!(parse_host_announcement(&[1, 0, 0, 0, 0, 0, 0, 0, 0xff]), None);
    }

    #[test]
    fn test_host_freeze() {
        let ha = announcement(50);
        let tx = freezing_transaction(&ha, 3);
        let host = host_from_announcement(&tx, &ha, 40).unwrap();
        assert_eq!(host.freeze, Currency::new(30));
        assert_eq!(host.ip_address, "192.0.2.10:9982");
        assert_eq!(host.weight(), Currency::new(15));
    }

    #[test]
    fn test_host_non_positive_freeze() {
        let ha = announcement(50);
        let tx = freezing_transaction(&ha, 3);
        assert_eq!(host_from_announcement(&tx, &ha, 50), None);
        assert_eq!(host_from_announcement(&tx, &ha, 60), None);
        let empty = freezing_transaction(&ha, 0);
        assert_eq!(host_from_announcement(&empty, &ha, 40), None);
    }

    #[test]
    fn test_host_mismatched_conditions() {
        let ha = announcement(50);
        let mut tx = freezing_transaction(&ha, 3);
        tx.outputs[0].spend_hash = Address([1; 32]);
        assert_eq!(host_from_announcement(&tx, &ha, 40), None);

        let mut out_of_range = ha.clone();
        out_of_range.freeze_index = 4;
        assert_eq!(host_from_announcement(&tx, &out_of_range, 40), None);
    }
}

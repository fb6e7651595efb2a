use skein_config::DataMover;
use skein_workflow::{ContextInfo, Protocol};

/// Protocols tried, in order, when producer and consumer sit on different hosts.
pub const PROTOCOL_PREFERENCE: [DataMover; 3] = [DataMover::Gridftp, DataMover::Scp, DataMover::Ftp];

/// Choose the mover for one reference.
///
/// - Without a context report for either side the configured `default` wins.
/// - Two reports naming the same IP always link.
/// - Otherwise the first protocol of [`PROTOCOL_PREFERENCE`] the source
///   reports active is used; `GRIDFTP` additionally needs transfer
///   endpoints on both sides (`endpoints_available`).
/// - With nothing usable the mover falls back to `LINK`.
pub fn select_mover(
  dst: Option<&ContextInfo>,
  src: Option<&ContextInfo>,
  endpoints_available: bool,
  default: DataMover,
) -> DataMover {
  let (Some(dst), Some(src)) = (dst, src) else {
    return default;
  };

  if src.same_host(dst) {
    return DataMover::Link;
  }

  PROTOCOL_PREFERENCE
    .into_iter()
    .find(|mover| match mover {
      DataMover::Gridftp => endpoints_available && src.is_active(Protocol::Gridftp),
      DataMover::Scp => src.is_active(Protocol::Scp),
      DataMover::Ftp => src.is_active(Protocol::Ftp),
      _ => false,
    })
    .unwrap_or(DataMover::Link)
}

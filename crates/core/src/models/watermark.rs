//! Read watermark model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The sequence number up to which a participant has acknowledged reading
/// a room. Monotonically non-decreasing; 0 means nothing read yet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReadWatermark {
    pub room_id: Uuid,
    pub participant_id: Uuid,
    pub last_read_seq: u64,
}

impl ReadWatermark {
    /// The implicit watermark every participant starts with
    pub fn initial(room_id: Uuid, participant_id: Uuid) -> Self {
        Self {
            room_id,
            participant_id,
            last_read_seq: 0,
        }
    }
}

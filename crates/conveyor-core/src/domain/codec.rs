//! TaskCodec - Task と wire bytes の相互変換
//!
//! wire 形式はフラットな UTF-8 JSON:
//! `{"task_id":4821,"task_type":"process_data","timestamp":1700000000.0}`
//!
//! version フィールドは持ちません。

use super::Task;
use super::errors::CodecError;

pub fn encode(task: &Task) -> Result<Vec<u8>, CodecError> {
    // JSON は NaN / inf を表現できない（serde_json は null にしてしまう）
    if !task.timestamp.is_finite() {
        return Err(CodecError::NonFiniteTimestamp(task.timestamp));
    }
    Ok(serde_json::to_vec(task)?)
}

pub fn decode(bytes: &[u8]) -> Result<Task, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskKind;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn encodes_with_stable_field_names() {
        let task = Task::new(4821, TaskKind::ProcessData, 1_700_000_000.0);
        let value: serde_json::Value = serde_json::from_slice(&encode(&task).unwrap()).unwrap();

        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert_eq!(object["task_id"], 4821);
        assert_eq!(object["task_type"], "process_data");
        assert_eq!(object["timestamp"], 1_700_000_000.0);
    }

    #[test]
    fn decodes_record_written_by_another_producer() {
        let raw = br#"{"task_id":4821,"task_type":"process_data","timestamp":1700000000.0}"#;
        let task = decode(raw).unwrap();
        assert_eq!(task, Task::new(4821, TaskKind::ProcessData, 1_700_000_000.0));
    }

    #[rstest]
    #[case::empty(b"".as_slice())]
    #[case::not_json(b"hello".as_slice())]
    #[case::missing_field(br#"{"task_id":1,"task_type":"process_data"}"#.as_slice())]
    #[case::unknown_kind(br#"{"task_id":1,"task_type":"mine_bitcoin","timestamp":1.0}"#.as_slice())]
    #[case::id_as_string(br#"{"task_id":"1","task_type":"process_data","timestamp":1.0}"#.as_slice())]
    #[case::null_timestamp(br#"{"task_id":1,"task_type":"process_data","timestamp":null}"#.as_slice())]
    #[case::invalid_utf8(b"\xff\xfe".as_slice())]
    fn rejects_malformed_input(#[case] raw: &[u8]) {
        assert!(matches!(decode(raw), Err(CodecError::Malformed(_))));
    }

    #[rstest]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    #[case(f64::NEG_INFINITY)]
    fn refuses_non_finite_timestamps(#[case] timestamp: f64) {
        let task = Task::new(1000, TaskKind::UpdateDatabase, timestamp);
        assert!(matches!(
            encode(&task),
            Err(CodecError::NonFiniteTimestamp(_))
        ));
    }

    fn any_kind() -> impl Strategy<Value = TaskKind> {
        prop::sample::select(TaskKind::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(
            task_id in any::<i64>(),
            kind in any_kind(),
            timestamp in 0.0f64..4_102_444_800.0,
        ) {
            let task = Task::new(task_id, kind, timestamp);
            let bytes = encode(&task).unwrap();
            prop_assert_eq!(decode(&bytes).unwrap(), task);
        }
    }
}

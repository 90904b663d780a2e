use crate::domain::model::{ParticipantId, Queue};
use crate::utils::error::{EngineError, EngineResult, Placement};

/// 將 `from` 位置的參與者移到 `to`，其餘保持相對順序
pub fn reorder(queue: &Queue, from: usize, to: usize) -> EngineResult<Queue> {
    let len = queue.len();
    for index in [from, to] {
        if index >= len {
            return Err(EngineError::IndexOutOfRange { index, len });
        }
    }

    let mut items = queue.0.clone();
    let moved = items.remove(from);
    items.insert(to, moved);
    Ok(Queue(items))
}

pub fn remove(queue: &Queue, participant_id: &ParticipantId) -> EngineResult<Queue> {
    let position = queue
        .position(participant_id)
        .ok_or_else(|| EngineError::ParticipantNotFound {
            participant_id: participant_id.clone(),
        })?;

    let mut items = queue.0.clone();
    items.remove(position);
    Ok(Queue(items))
}

/// 預設加到佇列尾端；指定位置時插入該處
pub fn insert(
    queue: &Queue,
    participant_id: ParticipantId,
    position: Option<usize>,
) -> EngineResult<Queue> {
    if queue.contains(&participant_id) {
        return Err(EngineError::DuplicateAssignment {
            participant_id,
            placement: Placement::Queue,
        });
    }

    let len = queue.len();
    let index = position.unwrap_or(len);
    if index > len {
        return Err(EngineError::IndexOutOfRange { index, len });
    }

    let mut items = queue.0.clone();
    items.insert(index, participant_id);
    Ok(Queue(items))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(ids: &[&str]) -> Queue {
        ids.iter().map(|id| ParticipantId::from(*id)).collect()
    }

    #[test]
    fn test_reorder_first_to_last() {
        let q = queue(&["a", "b", "c", "d"]);
        let moved = reorder(&q, 0, 3).unwrap();
        assert_eq!(moved, queue(&["b", "c", "d", "a"]));
        // 原本的快照不受影響
        assert_eq!(q, queue(&["a", "b", "c", "d"]));
    }

    #[test]
    fn test_reorder_last_to_first() {
        let q = queue(&["a", "b", "c"]);
        assert_eq!(reorder(&q, 2, 0).unwrap(), queue(&["c", "a", "b"]));
        assert_eq!(reorder(&q, 1, 1).unwrap(), q);
    }

    #[test]
    fn test_reorder_out_of_range() {
        let q = queue(&["a", "b"]);
        assert_eq!(
            reorder(&q, 0, 2).unwrap_err(),
            EngineError::IndexOutOfRange { index: 2, len: 2 }
        );
        assert_eq!(
            reorder(&q, 5, 0).unwrap_err(),
            EngineError::IndexOutOfRange { index: 5, len: 2 }
        );
        assert!(reorder(&Queue::new(), 0, 0).is_err());
    }

    #[test]
    fn test_remove() {
        let q = queue(&["a", "b", "c"]);
        assert_eq!(remove(&q, &"b".into()).unwrap(), queue(&["a", "c"]));
        assert!(matches!(
            remove(&q, &"z".into()),
            Err(EngineError::ParticipantNotFound { .. })
        ));
    }

    #[test]
    fn test_insert_defaults_to_back() {
        let q = queue(&["a", "b"]);
        assert_eq!(insert(&q, "c".into(), None).unwrap(), queue(&["a", "b", "c"]));
        assert_eq!(insert(&q, "c".into(), Some(0)).unwrap(), queue(&["c", "a", "b"]));
        assert_eq!(insert(&q, "c".into(), Some(2)).unwrap(), queue(&["a", "b", "c"]));
    }

    #[test]
    fn test_insert_rejects_bad_position_and_duplicates() {
        let q = queue(&["a"]);
        assert_eq!(
            insert(&q, "b".into(), Some(3)).unwrap_err(),
            EngineError::IndexOutOfRange { index: 3, len: 1 }
        );
        assert!(matches!(
            insert(&q, "a".into(), None),
            Err(EngineError::DuplicateAssignment { .. })
        ));
    }
}

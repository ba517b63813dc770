//! Explicit ordering of collected records.
//!
//! Workers finish in any order; nothing downstream relies on arrival order.

use dataforge_core::BatchDescriptor;

use crate::record::DatasetRecord;

/// Concatenate batch outputs by ascending batch id.
pub fn concat_in_batch_order<R>(mut outputs: Vec<(BatchDescriptor, Vec<R>)>) -> Vec<R> {
    outputs.sort_by_key(|(batch, _)| batch.batch_id);
    let total = outputs.iter().map(|(_, records)| records.len()).sum();
    let mut combined = Vec::with_capacity(total);
    for (_, records) in outputs {
        combined.extend(records);
    }
    combined
}

/// Order records by the field at `column`, ties broken by row index.
pub fn sort_records<R: DatasetRecord>(records: &mut [R], column: usize) {
    records.sort_by(|a, b| {
        a.value(column)
            .total_cmp(&b.value(column))
            .then_with(|| a.row_index().cmp(&b.row_index()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::EventRecord;
    use chrono::NaiveDate;

    fn event(row_index: u64, hour: u32) -> EventRecord {
        EventRecord {
            row_index,
            user_id: "u_0001".to_string(),
            event_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .and_then(|d| d.and_hms_opt(hour, 0, 0))
                .unwrap(),
            event_type: "view".to_string(),
            revenue: 0.0,
        }
    }

    fn descriptor(batch_id: u32) -> BatchDescriptor {
        BatchDescriptor {
            batch_id,
            start_index: 0,
            end_index: 0,
            seed: 0,
        }
    }

    #[test]
    fn batches_concatenate_by_id_not_arrival() {
        let outputs = vec![
            (descriptor(2), vec![event(4, 0)]),
            (descriptor(0), vec![event(0, 0), event(1, 0)]),
            (descriptor(1), vec![event(2, 0), event(3, 0)]),
        ];
        let rows: Vec<u64> = concat_in_batch_order(outputs)
            .iter()
            .map(|record| record.row_index)
            .collect();
        assert_eq!(rows, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn sort_uses_field_then_row_index() {
        let mut records = vec![event(3, 5), event(1, 9), event(2, 5), event(0, 1)];
        sort_records(&mut records, 2);
        let rows: Vec<u64> = records.iter().map(|record| record.row_index).collect();
        assert_eq!(rows, vec![0, 2, 3, 1]);
    }
}

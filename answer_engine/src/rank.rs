use std::collections::HashMap;

use log::debug;

use crate::config::OptionCount;

/// Competition ranking ("1224") of the options by decreasing count.
///
/// Ties share a rank and the next lower count takes its 1-based position in
/// the sorted order. Equal counts are ordered by serial number. The options are
/// returned in their input order with `rank` filled in.
pub fn competition_rank(options: &[OptionCount]) -> Vec<OptionCount> {
    let mut res = options.to_vec();
    assign_ranks(&mut res);
    res
}

/// In-place version of [competition_rank].
pub fn assign_ranks(options: &mut [OptionCount]) {
    let mut sorted: Vec<(i32, u64)> = options.iter().map(|o| (o.serial_num, o.count)).collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut ranks: HashMap<i32, u32> = HashMap::new();
    let mut current_rank: u32 = 1;
    for (idx, (serial_num, count)) in sorted.iter().enumerate() {
        if idx > 0 && *count < sorted[idx - 1].1 {
            current_rank = (idx + 1) as u32;
        }
        ranks.insert(*serial_num, current_rank);
    }
    debug!("assign_ranks: sorted: {:?} ranks: {:?}", sorted, ranks);

    for o in options.iter_mut() {
        o.rank = ranks.get(&o.serial_num).cloned().unwrap_or(1);
    }
}

use log::debug;

use crate::common::TrafficRecord;



/// Fewest leading characters two link ids must share before a fallback match is trusted.
pub const DEFAULT_MIN_PREFIX_LEN: usize = 4;

/// Number of leading characters `a` and `b` have in common.
pub fn common_prefix_len(a: &str, b: &str) -> usize {
	a.chars()
		.zip(b.chars())
		.take_while(|(x, y)| x == y)
		.count()
}

/// Find the traffic record describing `target_link`.
///
/// An exact id wins outright. Otherwise the record sharing the longest leading run of
/// characters with the target is taken, as long as that run is at least `min_prefix`
/// long; adjacent segments of one road are numbered under a common prefix. Ties keep
/// the earliest record.
pub fn match_link<'a>(target_link: &str, records: &'a [TrafficRecord], min_prefix: usize) -> Option<&'a TrafficRecord> {
	if let Some(exact) = records.iter().find(|record| record.link_id == target_link) {
		debug!("link {} matched exactly", target_link);
		return Some(exact);
	}

	let mut best: Option<&TrafficRecord> = None;
	let mut best_len = 0;
	for record in records {
		let len = common_prefix_len(target_link, &record.link_id);
		if len > best_len {
			best_len = len;
			best = Some(record);
		}
	}

	match best {
		Some(record) if best_len >= min_prefix => {
			debug!("link {} matched {} on a {} character prefix", target_link, record.link_id, best_len);
			Some(record)
		},
		_ => {
			debug!("no traffic record near link {} ({} candidates)", target_link, records.len());
			None
		}
	}
}

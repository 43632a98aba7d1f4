/// Congestion tier for a measured link speed.
#[derive(Clone, Copy)]
#[derive(Debug, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedTier {
	Smooth,
	Normal,
	Slow,
	Congested,
}

// km/h lower bounds, highest first
const SMOOTH_KMH: f64 = 80.0;
const NORMAL_KMH: f64 = 60.0;
const SLOW_KMH: f64 = 40.0;

impl SpeedTier {
	/// Never fails: negative or NaN speeds land in `Congested`.
	pub fn classify(speed_kmh: f64) -> SpeedTier {
		if speed_kmh >= SMOOTH_KMH {
			SpeedTier::Smooth
		} else if speed_kmh >= NORMAL_KMH {
			SpeedTier::Normal
		} else if speed_kmh >= SLOW_KMH {
			SpeedTier::Slow
		} else {
			SpeedTier::Congested
		}
	}

	/// Classify the textual speed the traffic feed sends.
	pub fn classify_text(speed: &str) -> SpeedTier {
		SpeedTier::classify(speed.trim().parse().unwrap_or(f64::NAN))
	}

	pub fn color(&self) -> &'static str {
		match self {
			SpeedTier::Smooth => "#22c55e",
			SpeedTier::Normal => "#eab308",
			SpeedTier::Slow => "#f97316",
			SpeedTier::Congested => "#ef4444",
		}
	}

	pub fn label(&self) -> &'static str {
		match self {
			SpeedTier::Smooth => "smooth",
			SpeedTier::Normal => "normal",
			SpeedTier::Slow => "slow",
			SpeedTier::Congested => "congested",
		}
	}
}



#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tier_boundaries() {
		assert_eq!(SpeedTier::classify(80.0), SpeedTier::Smooth);
		assert_eq!(SpeedTier::classify(79.9), SpeedTier::Normal);
		assert_eq!(SpeedTier::classify(60.0), SpeedTier::Normal);
		assert_eq!(SpeedTier::classify(59.9), SpeedTier::Slow);
		assert_eq!(SpeedTier::classify(40.0), SpeedTier::Slow);
		assert_eq!(SpeedTier::classify(39.9), SpeedTier::Congested);
	}

	#[test]
	fn malformed_speeds_are_congested() {
		assert_eq!(SpeedTier::classify(-5.0), SpeedTier::Congested);
		assert_eq!(SpeedTier::classify(f64::NAN), SpeedTier::Congested);
		assert_eq!(SpeedTier::classify_text("n/a"), SpeedTier::Congested);
		assert_eq!(SpeedTier::classify_text(""), SpeedTier::Congested);
	}

	#[test]
	fn absurdly_fast_is_still_smooth() {
		assert_eq!(SpeedTier::classify(1e6), SpeedTier::Smooth);
		assert_eq!(SpeedTier::classify_text(" 95 "), SpeedTier::Smooth);
	}

	#[test]
	fn each_tier_has_its_own_color() {
		assert_eq!(SpeedTier::Smooth.color(), "#22c55e");
		assert_eq!(SpeedTier::Congested.color(), "#ef4444");
		assert_ne!(SpeedTier::Normal.color(), SpeedTier::Slow.color());
	}

	#[test]
	fn serializes_as_label() {
		assert_eq!(serde_json::to_string(&SpeedTier::Slow).unwrap(), "\"slow\"");
		assert_eq!(SpeedTier::Slow.label(), "slow");
	}
}

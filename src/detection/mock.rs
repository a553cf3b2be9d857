//! Randomised stand-in verdicts used when the webhook is off or unusable.

use super::result::Assessment;
use rand::seq::SliceRandom;
use rand::Rng;

pub const INJURY_TYPES: [&str; 4] = ["Bruise", "Cut", "Swelling", "Fracture"];

/// Roughly three in eleven draws report an injury
pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Assessment {
    let has_injury = rng.gen_range(0..=10) > 7;

    if has_injury {
        let confidence = 0.75 + rng.gen_range(0..=25) as f64 / 100.0;
        let injury_type = INJURY_TYPES.choose(rng).copied().unwrap_or("Bruise");
        Assessment::new(true, confidence, injury_type)
    } else {
        let confidence = 0.15 + rng.gen_range(0..=35) as f64 / 100.0;
        Assessment::new(false, confidence, "None")
    }
}

/// Draw from the thread-local generator
pub fn assess() -> Assessment {
    generate(&mut rand::thread_rng())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_values_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut saw_injury = false;
        let mut saw_clear = false;

        for _ in 0..2000 {
            let a = generate(&mut rng);
            if a.has_injury {
                saw_injury = true;
                assert!((0.75..=1.0).contains(&a.confidence), "{}", a.confidence);
                assert!(INJURY_TYPES.contains(&a.injury_type.as_str()));
            } else {
                saw_clear = true;
                assert!((0.15..=0.50 + 1e-9).contains(&a.confidence), "{}", a.confidence);
                assert_eq!(a.injury_type, "None");
            }
        }

        assert!(saw_injury && saw_clear);
    }

    #[test]
    fn test_injury_rate_is_roughly_three_in_eleven() {
        let mut rng = StdRng::seed_from_u64(42);
        let injuries = (0..11_000).filter(|_| generate(&mut rng).has_injury).count();
        assert!((2500..3500).contains(&injuries), "{}", injuries);
    }
}

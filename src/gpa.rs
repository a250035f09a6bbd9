use crate::models::GpaEntry;

/// Every symbol a grade record may carry, in display order.
pub const LETTER_GRADES: [&str; 15] = [
    "A+", "A", "A-", "B+", "B", "B-", "C+", "C", "C-", "D+", "D", "D-", "F", "I", "W",
];

const GRADE_POINTS: [(&str, Option<f64>); 15] = [
    ("A+", Some(4.0)),
    ("A", Some(4.0)),
    ("A-", Some(3.7)),
    ("B+", Some(3.3)),
    ("B", Some(3.0)),
    ("B-", Some(2.7)),
    ("C+", Some(2.3)),
    ("C", Some(2.0)),
    ("C-", Some(1.7)),
    ("D+", Some(1.3)),
    ("D", Some(1.0)),
    ("D-", Some(0.7)),
    ("F", Some(0.0)),
    // Incomplete
    ("I", None),
    // Withdrawn
    ("W", None),
];

const SCORE_LADDER: [(f64, &str); 12] = [
    (97.0, "A+"),
    (93.0, "A"),
    (90.0, "A-"),
    (87.0, "B+"),
    (83.0, "B"),
    (80.0, "B-"),
    (77.0, "C+"),
    (73.0, "C"),
    (70.0, "C-"),
    (67.0, "D+"),
    (63.0, "D"),
    (60.0, "D-"),
];

/// GPA points for a letter grade. `None` for I, W and anything outside the
/// alphabet; the lookup is exact, so "a" and " A" are unknown too.
pub fn letter_to_points(letter: &str) -> Option<f64> {
    GRADE_POINTS
        .iter()
        .find(|(symbol, _)| *symbol == letter)
        .and_then(|(_, points)| *points)
}

pub fn is_gpa_bearing(letter: &str) -> bool {
    letter_to_points(letter).is_some()
}

/// Maps a score onto the letter ladder. Out-of-range scores are not rejected
/// here: 105 is an A+ and -5 is an F. Range checks belong to `validation`.
pub fn score_to_letter(score: f64) -> &'static str {
    SCORE_LADDER
        .iter()
        .find(|(threshold, _)| score >= *threshold)
        .map(|(_, letter)| *letter)
        .unwrap_or("F")
}

/// Credit-weighted GPA rounded half away from zero to two decimals.
///
/// Entries whose letter carries no points are dropped before weighting. An
/// empty selection or a zero credit total yields 0.0. Negative credits are
/// accepted as given.
pub fn calculate_gpa(entries: &[GpaEntry]) -> f64 {
    let mut total_points = 0.0;
    let mut total_credits = 0.0;
    let mut bearing = 0usize;

    for entry in entries {
        let Some(points) = letter_to_points(&entry.letter_grade) else {
            continue;
        };
        total_points += points * entry.credits;
        total_credits += entry.credits;
        bearing += 1;
    }

    if bearing == 0 || total_credits == 0.0 {
        return 0.0;
    }

    ((total_points / total_credits) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(letter: &str, credits: f64) -> GpaEntry {
        GpaEntry {
            letter_grade: letter.to_string(),
            credits,
        }
    }

    #[test]
    fn points_follow_table() {
        let expected = [
            ("A+", 4.0),
            ("A", 4.0),
            ("A-", 3.7),
            ("B+", 3.3),
            ("B", 3.0),
            ("B-", 2.7),
            ("C+", 2.3),
            ("C", 2.0),
            ("C-", 1.7),
            ("D+", 1.3),
            ("D", 1.0),
            ("D-", 0.7),
            ("F", 0.0),
        ];
        for (letter, points) in expected {
            assert_eq!(letter_to_points(letter), Some(points), "{letter}");
        }
    }

    #[test]
    fn incomplete_withdrawn_and_unknown_carry_no_points() {
        for letter in ["I", "W", "", "a", "b+", "A++", "E", " A", "A "] {
            assert_eq!(letter_to_points(letter), None, "{letter:?}");
            assert!(!is_gpa_bearing(letter));
        }
    }

    #[test]
    fn alphabet_matches_point_table() {
        let table: Vec<&str> = GRADE_POINTS.iter().map(|(symbol, _)| *symbol).collect();
        assert_eq!(table, LETTER_GRADES.to_vec());
    }

    #[test]
    fn ladder_boundaries() {
        let cases = [
            (100.0, "A+"),
            (97.0, "A+"),
            (96.0, "A"),
            (93.0, "A"),
            (92.0, "A-"),
            (90.0, "A-"),
            (89.0, "B+"),
            (87.0, "B+"),
            (86.0, "B"),
            (83.0, "B"),
            (82.0, "B-"),
            (80.0, "B-"),
            (79.0, "C+"),
            (77.0, "C+"),
            (76.0, "C"),
            (73.0, "C"),
            (72.0, "C-"),
            (70.0, "C-"),
            (69.0, "D+"),
            (67.0, "D+"),
            (66.0, "D"),
            (63.0, "D"),
            (62.0, "D-"),
            (60.0, "D-"),
            (59.0, "F"),
            (0.0, "F"),
        ];
        for (score, letter) in cases {
            assert_eq!(score_to_letter(score), letter, "{score}");
        }
    }

    #[test]
    fn fractional_scores_do_not_round_up() {
        assert_eq!(score_to_letter(96.9), "A");
        assert_eq!(score_to_letter(59.99), "F");
    }

    // Range checks are the caller's job; the ladder stays permissive.
    #[test]
    fn out_of_range_scores_still_map() {
        assert_eq!(score_to_letter(105.0), "A+");
        assert_eq!(score_to_letter(-10.0), "F");
        assert_eq!(score_to_letter(f64::NAN), "F");
    }

    #[test]
    fn every_producible_letter_is_bearing() {
        for score in 0..=100 {
            let letter = score_to_letter(f64::from(score));
            assert!(is_gpa_bearing(letter), "{score} -> {letter}");
        }
    }

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(calculate_gpa(&[]), 0.0);
    }

    #[test]
    fn excluded_entries_are_zero() {
        assert_eq!(calculate_gpa(&[entry("W", 3.0)]), 0.0);
        assert_eq!(calculate_gpa(&[entry("I", 4.0), entry("X", 2.0)]), 0.0);
    }

    #[test]
    fn weighted_average_rounds_to_two_places() {
        let gpa = calculate_gpa(&[entry("A", 4.0), entry("B", 3.0)]);
        assert_eq!(gpa, 3.57);
    }

    #[test]
    fn zero_credit_total_is_zero() {
        assert_eq!(calculate_gpa(&[entry("A", 0.0)]), 0.0);
        assert_eq!(calculate_gpa(&[entry("A", 0.0), entry("F", 0.0)]), 0.0);
    }

    #[test]
    fn withdrawn_entries_do_not_dilute() {
        let gpa = calculate_gpa(&[entry("B+", 3.0), entry("W", 4.0), entry("I", 2.0)]);
        assert_eq!(gpa, 3.3);
    }

    #[test]
    fn failing_grade_counts_as_zero_points() {
        let gpa = calculate_gpa(&[entry("A", 3.0), entry("F", 3.0)]);
        assert_eq!(gpa, 2.0);
    }

    #[test]
    fn rounds_half_away_from_zero() {
        // (4.0 * 1 + 3.0 * 7) / 8 = 3.125, exact in binary
        let gpa = calculate_gpa(&[entry("A", 1.0), entry("B", 7.0)]);
        assert_eq!(gpa, 3.13);
    }

    // Negative credits are not rejected here; course validation and the
    // schema refuse them before they reach a GPA.
    #[test]
    fn negative_credits_pass_through_unchecked() {
        // (4.0 * 3 + 3.0 * -1) / (3 - 1) = 4.5
        let gpa = calculate_gpa(&[entry("A", 3.0), entry("B", -1.0)]);
        assert_eq!(gpa, 4.5);

        // Credits cancelling to zero hit the zero-total guard.
        assert_eq!(calculate_gpa(&[entry("A", 2.0), entry("C", -2.0)]), 0.0);
    }

    #[test]
    fn results_have_at_most_two_decimals() {
        let letters = ["A+", "A-", "B+", "B-", "C+", "C-", "D+", "D-", "F"];
        for (i, first) in letters.iter().enumerate() {
            for second in letters.iter().skip(i) {
                let gpa = calculate_gpa(&[entry(first, 3.0), entry(second, 4.0)]);
                let scaled = gpa * 100.0;
                assert!((scaled - scaled.round()).abs() < 1e-6, "{gpa}");
                assert!(gpa >= 0.0);
            }
        }
    }
}

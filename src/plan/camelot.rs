/// Harmonic distance between two key strings via the Camelot wheel.
///
/// Adjacent wheel positions in the same ring mix cleanly (distance 0), the
/// relative major/minor costs 10, and every extra wheel step costs 10 more.
/// Keys that fail to parse fall back to a semitone-circle distance ×10.
pub(crate) fn camelot_distance(key_a: &str, key_b: &str) -> i64 {
    let (Some(a), Some(b)) = (camelot_position(key_a), camelot_position(key_b)) else {
        return semitone_distance(key_a, key_b) * 10;
    };

    let wheel = wheel_steps(a.number, b.number);
    if a.mode == b.mode {
        if wheel <= 1 { 0 } else { (wheel - 1) * 10 }
    } else if wheel == 0 {
        10
    } else {
        wheel * 10
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Major,
    Minor,
}

#[derive(Debug, Clone, Copy)]
struct CamelotPosition {
    number: i64,
    mode: Mode,
}

const NOTE_ORDER: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Wheel numbers for the outer (major, "B") ring indexed by pitch class;
/// the inner (minor, "A") ring of the same number sits three semitones down.
const MAJOR_WHEEL: [i64; 12] = [8, 3, 10, 5, 12, 7, 2, 9, 4, 11, 6, 1];
const MINOR_WHEEL: [i64; 12] = [5, 12, 7, 2, 9, 4, 11, 6, 1, 8, 3, 10];

fn camelot_position(key: &str) -> Option<CamelotPosition> {
    let (root, mode) = parse_key(key)?;
    let number = match mode {
        Mode::Major => MAJOR_WHEEL[root],
        Mode::Minor => MINOR_WHEEL[root],
    };
    Some(CamelotPosition { number, mode })
}

/// Parse `"<root> <Major|Minor>"` into a pitch-class index and mode.
pub(crate) fn parse_key(key: &str) -> Option<(usize, Mode)> {
    let mut parts = key.split_whitespace();
    let root = parts.next()?;
    let mode = match parts.next()? {
        "Major" => Mode::Major,
        "Minor" => Mode::Minor,
        _ => return None,
    };
    let idx = NOTE_ORDER.iter().position(|&name| name == root)?;
    Some((idx, mode))
}

fn wheel_steps(a: i64, b: i64) -> i64 {
    let diff = (a - b).abs();
    if diff > 6 { 12 - diff } else { diff }
}

fn semitone_distance(key_a: &str, key_b: &str) -> i64 {
    let diff = (root_index(key_a) - root_index(key_b)).abs();
    if diff > 6 { 12 - diff } else { diff }
}

fn root_index(key: &str) -> i64 {
    let root = key.split_whitespace().next().unwrap_or("");
    NOTE_ORDER
        .iter()
        .position(|&name| name == root)
        .unwrap_or(0) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_keys_are_distance_zero() {
        assert_eq!(camelot_distance("C Major", "C Major"), 0);
        assert_eq!(camelot_distance("A Minor", "A Minor"), 0);
    }

    #[test]
    fn wheel_neighbours_in_the_same_ring_are_free() {
        // C Major = 8B, G Major = 9B.
        assert_eq!(camelot_distance("C Major", "G Major"), 0);
        // A Minor = 8A, E Minor = 9A.
        assert_eq!(camelot_distance("A Minor", "E Minor"), 0);
    }

    #[test]
    fn relative_major_and_minor_cost_ten() {
        // C Major = 8B, A Minor = 8A.
        assert_eq!(camelot_distance("C Major", "A Minor"), 10);
        // F# Major = 2B, D# Minor = 2A.
        assert_eq!(camelot_distance("F# Major", "D# Minor"), 10);
    }

    #[test]
    fn distant_same_ring_keys_scale_by_steps() {
        // C Major = 8B, D Major = 10B: two steps, one free.
        assert_eq!(camelot_distance("C Major", "D Major"), 10);
        // C Major = 8B, C# Major = 3B: five steps.
        assert_eq!(camelot_distance("C Major", "C# Major"), 40);
    }

    #[test]
    fn cross_ring_distance_uses_full_steps() {
        // C Major = 8B, E Minor = 9A: one step across rings.
        assert_eq!(camelot_distance("C Major", "E Minor"), 10);
    }

    #[test]
    fn unmapped_keys_fall_back_to_semitone_circle() {
        assert_eq!(camelot_distance("H Phrygian", "C Major"), 0);
        // D is two semitones from C.
        assert_eq!(camelot_distance("D Weird", "C Major"), 20);
        assert_eq!(camelot_distance("B Weird", "C Major"), 10);
    }
}

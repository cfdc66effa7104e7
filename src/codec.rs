//! Chess960 back-rank codec and DFRC pair identifiers.
//!
//! A back rank is identified by its Scharnagl number in `0..960`. A DFRC start
//! position pairs two back ranks (White's and Black's) and is identified by a
//! single uid in `0..960²`, with the symmetric positions (same arrangement for
//! both sides) occupying the first 960 ids.

use crate::errors::{DfrcError, Result};
use crate::validation_error;

/// Number of Chess960 back-rank arrangements
pub const NUM_POSITIONS: u32 = 960;

/// Number of DFRC start positions (ordered pairs of back ranks)
pub const NUM_PAIRS: u32 = NUM_POSITIONS * NUM_POSITIONS;

/// Scharnagl number of the classical `rnbqkbnr` arrangement
pub const CLASSICAL_INDEX: u16 = 518;

/// The ten ways to choose two of the five squares left after bishops and queen
const KNIGHT_PAIRS: [(usize, usize); 10] = [
    (0, 1), (0, 2), (0, 3), (0, 4),
    (1, 2), (1, 3), (1, 4),
    (2, 3), (2, 4),
    (3, 4),
];

/// Convert a Scharnagl number to its 8-character back rank (lowercase, a-file first).
pub fn encode_position(index: u16) -> Result<String> {
    if u32::from(index) >= NUM_POSITIONS {
        return Err(DfrcError::InvalidIndex {
            index: i64::from(index),
            max: NUM_POSITIONS,
        });
    }

    let mut rank = [0u8; 8];
    let n = usize::from(index);

    let (n, light_bishop) = (n / 4, n % 4);
    let (n, dark_bishop) = (n / 4, n % 4);
    let (knights, queen) = (n / 6, n % 6);

    // Bishops on opposite colours: odd files are light squares on rank 1
    rank[light_bishop * 2 + 1] = b'b';
    rank[dark_bishop * 2] = b'b';

    let queen_file = empty_files(&rank)[queen];
    rank[queen_file] = b'q';

    let free = empty_files(&rank);
    let (first, second) = KNIGHT_PAIRS[knights];
    rank[free[first]] = b'n';
    rank[free[second]] = b'n';

    // Rook, king, rook fill what is left from the a-file outwards
    let rest = empty_files(&rank);
    rank[rest[0]] = b'r';
    rank[rest[1]] = b'k';
    rank[rest[2]] = b'r';

    Ok(rank.iter().map(|&b| b as char).collect())
}

/// Convert a back-rank string back to its Scharnagl number.
pub fn decode_position(position: &str) -> Result<u16> {
    validate_position(position)?;
    let bytes = position.as_bytes();

    let files_of = |piece: u8| -> Vec<usize> {
        bytes
            .iter()
            .enumerate()
            .filter(|(_, b)| **b == piece)
            .map(|(file, _)| file)
            .collect()
    };

    let bishops = files_of(b'b');
    let (dark, light) = if bishops[0] % 2 == 0 {
        (bishops[0], bishops[1])
    } else {
        (bishops[1], bishops[0])
    };
    let dark_bishop = dark / 2;
    let light_bishop = (light - 1) / 2;

    let queen_file = files_of(b'q')[0];
    let queen = queen_file - bishops.iter().filter(|&&b| b < queen_file).count();

    let free: Vec<usize> = (0..8)
        .filter(|file| !bishops.contains(file) && *file != queen_file)
        .collect();
    let knight_slots: Vec<usize> = files_of(b'n')
        .iter()
        .filter_map(|file| free.iter().position(|f| f == file))
        .collect();
    let knights = KNIGHT_PAIRS
        .iter()
        .position(|&(a, b)| a == knight_slots[0] && b == knight_slots[1])
        .ok_or_else(|| invalid_position(position, "knights outside the free squares"))?;

    let index = ((knights * 6 + queen) * 4 + dark_bishop) * 4 + light_bishop;
    Ok(index as u16)
}

/// True if `position` is a legal Chess960 back rank.
pub fn is_valid_position(position: &str) -> bool {
    validate_position(position).is_ok()
}

fn validate_position(position: &str) -> Result<()> {
    let bytes = position.as_bytes();
    if bytes.len() != 8 {
        return Err(invalid_position(position, "expected exactly 8 pieces"));
    }

    let count = |piece: u8| bytes.iter().filter(|&&b| b == piece).count();
    if let Some(bad) = bytes.iter().find(|b| !b"rnbqk".contains(b)) {
        return Err(invalid_position(
            position,
            &format!("unexpected piece '{}', expected one of r, n, b, q, k", *bad as char),
        ));
    }
    if count(b'r') != 2 || count(b'n') != 2 || count(b'b') != 2 || count(b'q') != 1 || count(b'k') != 1 {
        return Err(invalid_position(
            position,
            "expected two rooks, two knights, two bishops, one queen and one king",
        ));
    }

    let bishops: Vec<usize> = (0..8).filter(|&i| bytes[i] == b'b').collect();
    if bishops[0] % 2 == bishops[1] % 2 {
        return Err(invalid_position(position, "bishops must stand on opposite-coloured squares"));
    }

    let rooks: Vec<usize> = (0..8).filter(|&i| bytes[i] == b'r').collect();
    let king = (0..8).find(|&i| bytes[i] == b'k').unwrap_or_default();
    if !(rooks[0] < king && king < rooks[1]) {
        return Err(invalid_position(position, "king must stand between the rooks"));
    }

    Ok(())
}

fn empty_files(rank: &[u8; 8]) -> Vec<usize> {
    (0..8).filter(|&file| rank[file] == 0).collect()
}

fn invalid_position(position: &str, reason: &str) -> DfrcError {
    DfrcError::InvalidPosition {
        position: position.to_string(),
        reason: reason.to_string(),
    }
}

/// Map an ordered (white, black) pair to its DFRC uid.
pub fn pair_to_uid(white: u16, black: u16) -> Result<u32> {
    pair_to_uid_n(u32::from(white), u32::from(black), NUM_POSITIONS)
}

/// Map a DFRC uid back to its (white, black) pair.
pub fn uid_to_pair(uid: u32) -> Result<(u16, u16)> {
    let (white, black) = uid_to_pair_n(uid, NUM_POSITIONS)?;
    Ok((white as u16, black as u16))
}

/// Diagonal-first pair bijection over an `n × n` grid.
///
/// For `n = 5` the ids are laid out as:
///
/// ```text
///        b=0  b=1  b=2  b=3  b=4
///   w=0    0    5    6    7    8
///   w=1    9    1   10   11   12
///   w=2   13   14    2   15   16
///   w=3   17   18   19    3   20
///   w=4   21   22   23   24    4
/// ```
pub fn pair_to_uid_n(white: u32, black: u32, n: u32) -> Result<u32> {
    n.checked_mul(n).ok_or_else(|| validation_error!("n", n, "n * n to fit in u32"))?;
    if white >= n || black >= n {
        return Err(validation_error!(
            "pair",
            format!("({}, {})", white, black),
            format!("both indices in [0, {})", n)
        ));
    }

    if white == black {
        return Ok(white);
    }

    let row_base = n + white * (n - 1);
    let offset = if black < white { black } else { black - 1 };
    Ok(row_base + offset)
}

/// Inverse of [`pair_to_uid_n`].
pub fn uid_to_pair_n(uid: u32, n: u32) -> Result<(u32, u32)> {
    let limit = n.checked_mul(n).ok_or_else(|| validation_error!("n", n, "n * n to fit in u32"))?;
    if uid >= limit {
        return Err(validation_error!("uid", uid, format!("0 <= uid < {}", limit)));
    }

    if uid < n {
        return Ok((uid, uid));
    }

    let offset = uid - n;
    let white = offset / (n - 1);
    let remainder = offset % (n - 1);
    let black = if remainder < white { remainder } else { remainder + 1 };
    Ok((white, black))
}

/// Uid of the same pair with colours swapped.
pub fn swapped_uid(uid: u32) -> Result<u32> {
    let (white, black) = uid_to_pair(uid)?;
    pair_to_uid(black, white)
}

/// Black's back rank is White's reflected across the d/e-file axis.
pub fn is_mirrored(white: &str, black: &str) -> bool {
    white.len() == black.len() && white.chars().rev().eq(black.chars())
}

/// Both sides share the same back rank, as in classical chess.
pub fn is_flipped(white: &str, black: &str) -> bool {
    white == black
}

/// FEN of the DFRC start position for a (white, black) pair.
///
/// Castling rights are written Shredder-style with the rook files, so the
/// result must be parsed in Chess960 castling mode.
pub fn start_fen(white_id: u16, black_id: u16) -> Result<String> {
    let white = encode_position(white_id)?;
    let black = encode_position(black_id)?;

    let rook_files = |rank: &str| -> Vec<char> {
        rank.char_indices()
            .rev()
            .filter(|(_, piece)| *piece == 'r')
            .map(|(file, _)| (b'a' + file as u8) as char)
            .collect()
    };
    let castling: String = rook_files(&white)
        .into_iter()
        .map(|c| c.to_ascii_uppercase())
        .chain(rook_files(&black))
        .collect();

    Ok(format!(
        "{}/pppppppp/8/8/8/8/PPPPPPPP/{} w {} - 0 1",
        black,
        white.to_ascii_uppercase(),
        castling
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_all_positions_round_trip() {
        let mut seen = HashSet::new();
        for index in 0..NUM_POSITIONS as u16 {
            let position = encode_position(index).unwrap();
            assert!(is_valid_position(&position), "{} -> {}", index, position);
            assert_eq!(decode_position(&position).unwrap(), index, "{}", position);
            seen.insert(position);
        }
        assert_eq!(seen.len(), 960);
    }

    #[test]
    fn test_known_positions() {
        assert_eq!(encode_position(0).unwrap(), "bbqnnrkr");
        assert_eq!(encode_position(959).unwrap(), "rkrnnqbb");
        assert_eq!(encode_position(CLASSICAL_INDEX).unwrap(), "rnbqkbnr");
        assert_eq!(decode_position("rnbqkbnr").unwrap(), 518);
    }

    #[test]
    fn test_light_bishop_left_of_dark_bishop() {
        // b on b-file (light) and c-file (dark)
        let index = decode_position("rbbqknnr").unwrap();
        assert_eq!(encode_position(index).unwrap(), "rbbqknnr");
    }

    #[test]
    fn test_invalid_index() {
        assert_eq!(
            encode_position(960),
            Err(DfrcError::InvalidIndex { index: 960, max: 960 })
        );
    }

    #[test]
    fn test_invalid_positions() {
        for bad in ["rnbqkbn", "rnbqkbnrr", "rnbqkbnx", "rnbkqnbr", "krbqnbnr", "rnbqqbnr", "RNBQKBNR"] {
            match decode_position(bad) {
                Err(DfrcError::InvalidPosition { position, .. }) => assert_eq!(position, bad),
                other => panic!("expected InvalidPosition for {}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_pair_uid_layout_small_grid() {
        let expected = [
            [0, 5, 6, 7, 8],
            [9, 1, 10, 11, 12],
            [13, 14, 2, 15, 16],
            [17, 18, 19, 3, 20],
            [21, 22, 23, 24, 4],
        ];
        for (w, row) in expected.iter().enumerate() {
            for (b, &uid) in row.iter().enumerate() {
                assert_eq!(pair_to_uid_n(w as u32, b as u32, 5).unwrap(), uid);
                assert_eq!(uid_to_pair_n(uid, 5).unwrap(), (w as u32, b as u32));
            }
        }
    }

    #[test]
    fn test_pair_uid_bijection() {
        let mut seen = vec![false; NUM_PAIRS as usize];
        for white in 0..NUM_POSITIONS as u16 {
            for black in 0..NUM_POSITIONS as u16 {
                let uid = pair_to_uid(white, black).unwrap();
                assert!(!seen[uid as usize], "uid {} produced twice", uid);
                seen[uid as usize] = true;
                assert_eq!(uid_to_pair(uid).unwrap(), (white, black));
            }
            assert_eq!(pair_to_uid(white, white).unwrap(), u32::from(white));
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_pair_uid_out_of_range() {
        assert!(matches!(pair_to_uid(960, 0), Err(DfrcError::OutOfRange { .. })));
        assert!(matches!(pair_to_uid(0, 960), Err(DfrcError::OutOfRange { .. })));
        assert!(matches!(uid_to_pair(NUM_PAIRS), Err(DfrcError::OutOfRange { .. })));
    }

    #[test]
    fn test_swapped_uid() {
        let uid = pair_to_uid(3, 700).unwrap();
        let swapped = swapped_uid(uid).unwrap();
        assert_ne!(uid, swapped);
        assert_eq!(uid_to_pair(swapped).unwrap(), (700, 3));
        assert_eq!(swapped_uid(swapped).unwrap(), uid);
        assert_eq!(swapped_uid(42).unwrap(), 42);
    }

    #[test]
    fn test_symmetry_helpers() {
        assert!(is_flipped("rnbqkbnr", "rnbqkbnr"));
        assert!(!is_flipped("rnbqkbnr", "rnbkqbnr"));
        assert!(is_mirrored("rnbqkbnr", "rnbkqbnr"));
        assert!(!is_mirrored("rnbqkbnr", "rnbqkbnr"));
    }

    #[test]
    fn test_start_fen() {
        assert_eq!(
            start_fen(CLASSICAL_INDEX, CLASSICAL_INDEX).unwrap(),
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w HAha - 0 1"
        );
        assert_eq!(
            start_fen(0, 959).unwrap(),
            "rkrnnqbb/pppppppp/8/8/8/8/PPPPPPPP/BBQNNRKR w HFca - 0 1"
        );
    }
}

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use pgn_position_index::{Config, IndexConfig};

/// Three storable games, one malformed, one too short, one between weak
/// players and one from a set-up position.
pub const SAMPLE: &str = r#"[Event "Wijk aan Zee"]
[Site "Wijk aan Zee NED"]
[Date "1999.01.20"]
[Round "4"]
[White "Kasparov, Garry"]
[Black "Topalov, Veselin"]
[Result "1-0"]
[WhiteElo "2812"]
[BlackElo "2700"]

1. e4 d6 2. d4 Nf6 3. Nc3 g6 4. Be3 Bg7 5. Qd2 c6 6. f3 b5 7. Nge2 Nbd7
8. Bh6 Bxh6 9. Qxh6 Bb7 10. a3 e5 11. O-O-O Qe7 12. Kb1 a6 1-0

[Event "Rapid"]
[White "Anand, Viswanathan"]
[Black "Carlsen, Magnus"]
[Result "1/2-1/2"]
[WhiteElo "2775"]
[BlackElo "2870"]

1. d4 Nf6 2. c4 e6 {Nimzo or Queen's Gambit} 3. Nf3 (3. Nc3 Bb4 4. Qc2 (4. e3 O-O)
4... O-O) 3... d5 4. Nc3 Be7 $1 5. Bf4 O-O 6. e3 c5 7. dxc5 Bxc5 1/2-1/2

[Event "Blitz"]
[White "Broken, Game"]
[Black "Someone, Else"]
[Result "1-0"]

1. e4 e5 2. Nf3 Nc6 3. Bb5 Nf6 4. Qxf7 d6 1-0

[Event "Blitz"]
[White "Short, Nigel"]
[Black "Quick, Draw"]
[Result "1-0"]

1. e4 e5 1-0

[Event "Club"]
[White "Weak, One"]
[Black "Weak, Two"]
[Result "0-1"]
[WhiteElo "1500"]
[BlackElo "1600"]

1. e4 c5 2. Nf3 d6 3. d4 cxd4 4. Nxd4 Nf6 5. Nc3 a6 0-1

[Event "Study"]
[White "Composer, A"]
[Black "Solver, B"]
[SetUp "1"]
[FEN "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1"]
[Result "*"]

1. e4 Kd7 *

[Event "Olympiad"]
[White "Kramnik, Vladimir"]
[Black "Aronian, Levon"]
[Result "0-1"]

1. d4 Nf6 2. c4 e6 3. Nf3 d5 4. Nc3 dxc4 5. e4 b5 6. e5 b4 7. exf6 bxc3
8. fxg7 cxb2 9. gxh8=Q bxa1=Q 0-1
"#;

/// Plies of the storable games of [`SAMPLE`], in file order.
pub const STORED_PLIES: [usize; 3] = [24, 14, 18];

pub fn write_pgn(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

/// Few buckets and a small quota, so early flushes happen.
pub fn small_config() -> Config {
    Config {
        index: IndexConfig {
            nbr_buckets: 64,
            purge_quota: 8,
            ..IndexConfig::default()
        },
        ..Config::default()
    }
}

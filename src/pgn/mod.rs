//! Streaming reader for game notation files.
//!
//! [`PgnReader::process`] feeds bytes through the [`lexer::Lexer`] state
//! machine and applies the events it produces: moves are converted and
//! played on a board, variations push and pop board snapshots, and every
//! finished mainline is handed to a [`GameSink`]. A bad game is dropped and
//! reading carries on with the next one.

pub mod headers;
pub mod lexer;

use std::{
    collections::VecDeque,
    io::{BufReader, Bytes, Read},
};

use log::{debug, info, trace};
use serde::Serialize;
use shakmaty::{fen::Fen, san::SanPlus, CastlingMode, Chess, Move, Position};

pub use headers::{GameHeaders, Tag};
pub use lexer::{Event, Lexer, ParseError, State};

use crate::{
    config::ReaderConfig,
    error::Result,
    hashing::{play_and_update, INITIAL_HASH},
    progress::Progress,
};

/// A completed mainline with its metadata and the running position hash
/// after every ply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedGame {
    pub headers: GameHeaders,
    pub moves: Vec<Move>,
    pub hashes: Vec<u64>,
}

/// Consumer of completed games.
pub trait GameSink {
    /// A new game's headers are about to be read.
    fn game_begin(&mut self) {}

    /// An error returned here stops the whole read.
    fn game_complete(&mut self, game: &ParsedGame) -> Result<()>;
}

impl GameSink for Vec<ParsedGame> {
    fn game_complete(&mut self, game: &ParsedGame) -> Result<()> {
        self.push(game.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReaderStats {
    pub games_started: u64,
    pub games_completed: u64,
    pub games_failed: u64,
    pub setup_games_skipped: u64,
    pub bytes_read: u64,
}

impl std::ops::AddAssign for ReaderStats {
    fn add_assign(&mut self, other: Self) {
        self.games_started += other.games_started;
        self.games_completed += other.games_completed;
        self.games_failed += other.games_failed;
        self.setup_games_skipped += other.setup_games_skipped;
        self.bytes_read += other.bytes_read;
    }
}

/// One level of variation nesting.
#[derive(Debug, Clone)]
struct Frame {
    moves: Vec<Move>,
    hashes: Vec<u64>,
    /// Position of the enclosing line when this variation opened.
    branch_point: Option<Chess>,
}

impl Frame {
    fn root() -> Self {
        Self {
            moves: Vec::new(),
            hashes: Vec::new(),
            branch_point: None,
        }
    }

    fn hash(&self) -> u64 {
        self.hashes.last().copied().unwrap_or(INITIAL_HASH)
    }
}

/// The last few input bytes, for error reports.
#[derive(Debug)]
struct RecentInput {
    bytes: VecDeque<u8>,
    capacity: usize,
}

impl RecentInput {
    fn new(capacity: usize) -> Self {
        Self {
            bytes: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, byte: u8) {
        if self.bytes.len() == self.capacity {
            self.bytes.pop_front();
        }
        self.bytes.push_back(byte);
    }

    fn snapshot(&self) -> String {
        let (a, b) = self.bytes.as_slices();
        let mut text = String::from_utf8_lossy(a).into_owned();
        text.push_str(&String::from_utf8_lossy(b));
        text.replace('\n', " ")
    }
}

pub struct PgnReader {
    config: ReaderConfig,
    lexer: Lexer,
    headers: GameHeaders,
    frames: Vec<Frame>,
    position: Chess,
    setup: Option<Chess>,
    game_failed: bool,
    game_started: bool,
    recent: RecentInput,
    stats: ReaderStats,
}

impl PgnReader {
    pub fn new(config: &ReaderConfig) -> Self {
        Self {
            config: config.clone(),
            lexer: Lexer::new(config),
            headers: GameHeaders::default(),
            frames: vec![Frame::root()],
            position: Chess::default(),
            setup: None,
            game_failed: false,
            game_started: false,
            recent: RecentInput::new(64),
            stats: ReaderStats::default(),
        }
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Reads every game in `reader`, delivering completed ones to `sink`.
    ///
    /// Returns `Ok(true)` if `progress` asked to stop. Cancellation is only
    /// checked after a completed game.
    pub fn process<R: Read>(
        &mut self,
        reader: R,
        sink: &mut dyn GameSink,
        progress: &mut dyn Progress,
    ) -> Result<bool> {
        let mut input = BufReader::new(reader).bytes();
        let mut events = Vec::new();

        while let Some(byte) = self.next_byte(&mut input)? {
            self.recent.push(byte);
            let mut completed = false;
            let mut next = Some(byte);
            while let Some(ch) = next {
                next = self.lexer.step(ch, &mut events);
                completed |= self.apply_events(&mut events, sink)?;
            }
            if completed && progress.report(self.stats.bytes_read) {
                info!(
                    "Reading cancelled after {} games",
                    self.stats.games_completed
                );
                return Ok(true);
            }
        }

        if self.lexer.in_token() {
            self.lexer.step(b'\n', &mut events);
            self.apply_events(&mut events, sink)?;
        }
        self.lexer.finish(&mut events);
        self.apply_events(&mut events, sink)?;
        progress.report(self.stats.bytes_read);

        info!(
            "Finished reading: {} games completed, {} failed, {} with setup skipped",
            self.stats.games_completed, self.stats.games_failed, self.stats.setup_games_skipped
        );
        Ok(false)
    }

    fn next_byte<R: Read>(&mut self, input: &mut Bytes<BufReader<R>>) -> Result<Option<u8>> {
        loop {
            match input.next() {
                None => return Ok(None),
                Some(byte) => {
                    let byte = byte?;
                    self.stats.bytes_read += 1;
                    if byte != b'\r' {
                        return Ok(Some(byte));
                    }
                }
            }
        }
    }

    /// Applies and drains `events`. Returns true if a game was completed.
    fn apply_events(&mut self, events: &mut Vec<Event>, sink: &mut dyn GameSink) -> Result<bool> {
        let mut completed = false;
        for event in events.drain(..) {
            if !self.game_started && matches!(event, Event::Tag(..) | Event::Move { .. }) {
                self.game_started = true;
                self.stats.games_started += 1;
            }
            match event {
                Event::GameBegin => self.game_begin(sink),
                Event::GameOver => {
                    self.game_over(sink)?;
                    completed = true;
                }
                Event::Tag(tag, value) => self.tag(tag, value),
                Event::Malformed(err) => self.abandon(err, false),
                Event::Glyph(nag) => trace!("glyph ${}", nag),
                _ if self.game_failed => {}
                Event::Move {
                    white,
                    move_number,
                    token,
                } => {
                    if let Err(err) = self.play(white, move_number, &token) {
                        self.abandon(err, true);
                    }
                }
                Event::VariationStart => self.variation_start(),
                Event::VariationEnd => self.variation_end(),
            }
        }
        Ok(completed)
    }

    fn abandon(&mut self, err: ParseError, force_lexer: bool) {
        if force_lexer {
            self.lexer.fail();
        }
        if !self.game_failed {
            self.game_failed = true;
            self.stats.games_failed += 1;
            debug!(
                "Skipping game {} - {} ({}): {} near \"{}\"",
                self.headers.white,
                self.headers.black,
                self.headers.date,
                err,
                self.recent.snapshot()
            );
        }
    }

    fn reset_board(&mut self) {
        self.frames.clear();
        self.frames.push(Frame::root());
        self.position = Chess::default();
        self.setup = None;
    }

    fn game_begin(&mut self, sink: &mut dyn GameSink) {
        self.headers = GameHeaders::default();
        self.game_failed = false;
        self.game_started = false;
        self.reset_board();
        sink.game_begin();
    }

    fn game_over(&mut self, sink: &mut dyn GameSink) -> Result<()> {
        if self.frames.len() > 1 {
            self.abandon(ParseError::UnterminatedVariation, false);
        }
        let root = std::mem::replace(&mut self.frames[0], Frame::root());
        if self.game_failed {
            trace!("Not delivering failed game");
        } else if self.headers.has_setup() {
            self.stats.setup_games_skipped += 1;
        } else {
            let game = ParsedGame {
                headers: self.headers.clone(),
                moves: root.moves,
                hashes: root.hashes,
            };
            self.stats.games_completed += 1;
            sink.game_complete(&game)?;
        }
        self.reset_board();
        Ok(())
    }

    fn tag(&mut self, tag: Tag, value: String) {
        if !self.headers.apply(tag, value) {
            return;
        }
        match Fen::from_ascii(self.headers.fen.as_bytes())
            .map_err(|e| e.to_string())
            .and_then(|fen| {
                fen.into_position::<Chess>(CastlingMode::Standard)
                    .map_err(|e| e.to_string())
            }) {
            Ok(position) => {
                self.position = position.clone();
                self.setup = Some(position);
            }
            // the game is never delivered, its moves will simply fail
            Err(err) => debug!("Ignoring setup \"{}\": {}", self.headers.fen, err),
        }
    }

    fn start_position(&self) -> Chess {
        self.setup.clone().unwrap_or_default()
    }

    fn play(&mut self, white: bool, move_number: u32, token: &[u8]) -> Result<(), ParseError> {
        if move_number == 0 {
            return Err(ParseError::MoveOutOfSequence { white });
        }
        let ply = (move_number as usize - 1) * 2 + usize::from(!white);
        let len = self.frames.last().map_or(0, |frame| frame.moves.len());
        if ply > len {
            return Err(ParseError::MoveOutOfSequence { white });
        }
        if ply < len {
            // the token revisits an earlier ply, so replay up to it
            let mut position = self.start_position();
            if let Some(frame) = self.frames.last_mut() {
                for mv in &frame.moves[..ply] {
                    position.play_unchecked(mv);
                }
                frame.moves.truncate(ply);
                frame.hashes.truncate(ply);
            }
            self.position = position;
        }
        if ply >= self.config.max_plies {
            return Err(ParseError::GameTooLong(self.config.max_plies));
        }

        let end = token
            .iter()
            .rposition(|&c| c != b'!' && c != b'?')
            .map_or(0, |i| i + 1);
        let mv = SanPlus::from_ascii(&token[..end])
            .ok()
            .and_then(|san_plus| san_plus.san.to_move(&self.position).ok())
            .ok_or_else(|| ParseError::IllegalMove(String::from_utf8_lossy(token).into_owned()))?;

        if let Some(frame) = self.frames.last_mut() {
            let hash = play_and_update(frame.hash(), &mut self.position, &mv);
            frame.moves.push(mv);
            frame.hashes.push(hash);
        }
        Ok(())
    }

    fn variation_start(&mut self) {
        if let Some(parent) = self.frames.last() {
            let child = Frame {
                moves: parent.moves.clone(),
                hashes: parent.hashes.clone(),
                branch_point: Some(self.position.clone()),
            };
            self.frames.push(child);
        }
    }

    fn variation_end(&mut self) {
        if self.frames.len() < 2 {
            return;
        }
        if let Some(Frame {
            branch_point: Some(position),
            ..
        }) = self.frames.pop()
        {
            self.position = position;
        }
    }
}

/// Reads all games from an in-memory buffer.
pub fn read_games(text: &[u8], config: &ReaderConfig) -> Result<(Vec<ParsedGame>, ReaderStats)> {
    let mut reader = PgnReader::new(config);
    let mut games = Vec::new();
    reader.process(text, &mut games, &mut crate::progress::NoProgress)?;
    Ok((games, reader.stats()))
}

//! Character driven state machine for game notation.
//!
//! [`Lexer::step`] consumes one byte and appends the resulting [`Event`]s to
//! an output list. It never touches a board: the driver applies the events,
//! and when a move turns out to be unplayable it calls [`Lexer::fail`] to
//! skip the rest of the game.

use btoi::btoi;

use super::headers::{extract_tag, Tag};
use crate::config::ReaderConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Init,
    Prefix,
    Header,
    InComment,
    BetweenMoves,
    MoveNumber,
    PostMoveNumber,
    PostMoveNumberHavePeriod,
    PostMoveNumberBlack,
    PreMoveWhite,
    PreMoveBlack,
    InMoveWhite,
    InMoveBlack,
    Error,
    InDollar,
}

impl State {
    /// States that belong to the movetext of a game in progress.
    fn in_game(self) -> bool {
        matches!(
            self,
            State::BetweenMoves
                | State::MoveNumber
                | State::PostMoveNumber
                | State::PostMoveNumberHavePeriod
                | State::PostMoveNumberBlack
                | State::PreMoveWhite
                | State::PreMoveBlack
                | State::InMoveWhite
                | State::InMoveBlack
        )
    }

    /// States in which comment, glyph and variation characters are ordinary
    /// input.
    fn is_opaque(self) -> bool {
        matches!(
            self,
            State::Header
                | State::InComment
                | State::InDollar
                | State::InMoveWhite
                | State::InMoveBlack
        )
    }
}

/// Why the current game was abandoned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("bad move number")]
    BadMoveNumber,
    #[error("token longer than {0} bytes")]
    TokenTooLong(usize),
    #[error("variations nested deeper than {0}")]
    VariationTooDeep(usize),
    #[error("variation closed without being opened")]
    UnbalancedVariation,
    #[error("game ended inside a variation")]
    UnterminatedVariation,
    #[error("{} move out of sequence", side(.white))]
    MoveOutOfSequence { white: bool },
    #[error("cannot convert move {0}")]
    IllegalMove(String),
    #[error("game longer than {0} plies")]
    GameTooLong(usize),
    #[error("invalid setup position: {0}")]
    BadSetup(String),
}

fn side(white: &bool) -> &'static str {
    if *white {
        "white"
    } else {
        "black"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Tag(Tag, String),
    GameBegin,
    GameOver,
    Move {
        white: bool,
        move_number: u32,
        token: Vec<u8>,
    },
    VariationStart,
    VariationEnd,
    Glyph(u32),
    Malformed(ParseError),
}

const RESULTS: [&[u8]; 4] = [b"1-0", b"0-1", b"1/2-1/2", b"*"];

#[inline]
fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n')
}

#[derive(Debug)]
pub struct Lexer {
    state: State,
    save_state: State,
    comment: u8,
    previous: u8,
    buf: Vec<u8>,
    move_number: u32,
    nag: u32,
    declared_result: String,
    /// State and move number to resume when each open variation closes.
    variations: Vec<(State, u32)>,
    max_token_len: usize,
    max_depth: usize,
}

impl Lexer {
    pub fn new(config: &ReaderConfig) -> Self {
        Self {
            state: State::Init,
            save_state: State::Init,
            comment: 0,
            previous: 0,
            buf: Vec::with_capacity(config.max_token_len),
            move_number: 0,
            nag: 0,
            declared_result: String::new(),
            variations: Vec::with_capacity(config.max_variation_depth),
            max_token_len: config.max_token_len,
            max_depth: config.max_variation_depth,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// True while a move number or move token is half read.
    pub fn in_token(&self) -> bool {
        matches!(
            self.state,
            State::MoveNumber | State::InMoveWhite | State::InMoveBlack
        )
    }

    /// Abandons the current game. Input is skipped until the next header.
    pub fn fail(&mut self) {
        self.state = State::Error;
        self.buf.clear();
    }

    /// Consumes one byte. Returns a byte to be fed again before reading on.
    pub fn step(&mut self, ch: u8, events: &mut Vec<Event>) -> Option<u8> {
        let old_state = self.state;
        let mut push_back = None;
        let opaque = self.state.is_opaque();

        if !opaque && (ch == b'{' || ch == b';') {
            self.save_state = self.state;
            self.comment = ch;
            self.state = State::InComment;
        } else if self.state == State::InComment
            && ((self.comment == b'{' && ch == b'}')
                || (self.comment == b';' && ch != b';' && self.previous == b'\n'))
        {
            if self.comment == b';' {
                push_back = Some(ch);
            }
            self.state = self.save_state;
        } else if !opaque && ch == b'$' {
            self.save_state = self.state;
            self.state = State::InDollar;
            self.nag = 0;
        } else if self.state == State::InDollar {
            if ch.is_ascii_digit() {
                self.nag = self
                    .nag
                    .saturating_mul(10)
                    .saturating_add(u32::from(ch - b'0'));
            } else {
                events.push(Event::Glyph(self.nag));
                push_back = Some(ch);
                self.state = self.save_state;
            }
        } else if !opaque && self.state != State::Error && ch == b'(' {
            self.push_variation(events);
        } else if !opaque && self.state != State::Error && ch == b')' {
            self.pop_variation(events);
        } else {
            push_back = self.step_state(ch, events);
        }

        if self.state != old_state {
            self.on_transition(old_state, events);
        }
        self.previous = ch;
        push_back
    }

    /// Handles end of input. A game still in its movetext is completed.
    /// Any half read token must have been flushed with a delimiter first.
    pub fn finish(&mut self, events: &mut Vec<Event>) {
        let effective = match self.state {
            State::InComment | State::InDollar => self.save_state,
            state => state,
        };
        if effective.in_game() {
            events.push(Event::GameOver);
        }
        self.state = State::Init;
        self.variations.clear();
        self.buf.clear();
    }

    fn push_variation(&mut self, events: &mut Vec<Event>) {
        if self.variations.len() >= self.max_depth {
            events.push(Event::Malformed(ParseError::VariationTooDeep(self.max_depth)));
            self.state = State::Error;
        } else {
            self.variations.push((self.state, self.move_number));
            events.push(Event::VariationStart);
            self.state = State::BetweenMoves;
        }
    }

    fn pop_variation(&mut self, events: &mut Vec<Event>) {
        match self.variations.pop() {
            Some((state, move_number)) => {
                events.push(Event::VariationEnd);
                self.state = state;
                self.move_number = move_number;
            }
            None => {
                events.push(Event::Malformed(ParseError::UnbalancedVariation));
                self.state = State::Error;
            }
        }
    }

    fn is_result(&self, token: &[u8]) -> bool {
        !token.is_empty()
            && (token == self.declared_result.as_bytes() || RESULTS.contains(&token))
    }

    fn accumulate(&mut self, ch: u8, events: &mut Vec<Event>) {
        if self.buf.len() < self.max_token_len {
            self.buf.push(ch);
        } else {
            events.push(Event::Malformed(ParseError::TokenTooLong(self.max_token_len)));
            self.state = State::Error;
        }
    }

    fn step_state(&mut self, ch: u8, events: &mut Vec<Event>) -> Option<u8> {
        let mut push_back = None;
        match self.state {
            State::InComment | State::InDollar => {}
            State::Init => {
                push_back = Some(ch);
                self.state = State::Prefix;
            }
            State::Prefix => {
                if ch == b'[' {
                    push_back = Some(ch);
                    self.state = State::Header;
                } else if ch.is_ascii_digit() || ch == b'*' {
                    push_back = Some(ch);
                    self.state = State::MoveNumber;
                }
            }
            State::Header => {
                // over-long header lines are truncated, not fatal
                if self.buf.len() < self.max_token_len {
                    self.buf.push(ch);
                }
                if ch == b']' {
                    self.state = State::Prefix;
                }
            }
            State::MoveNumber => {
                if ch == b'.' || is_space(ch) {
                    let token = std::mem::take(&mut self.buf);
                    if self.is_result(&token) {
                        self.state = State::Prefix;
                    } else {
                        match btoi::<u32>(&token) {
                            Ok(n) if n > 0 => {
                                self.move_number = n;
                                self.state = State::PostMoveNumber;
                                if ch == b'.' {
                                    push_back = Some(ch);
                                }
                            }
                            _ => {
                                events.push(Event::Malformed(ParseError::BadMoveNumber));
                                self.state = State::Error;
                            }
                        }
                    }
                } else {
                    self.accumulate(ch, events);
                }
            }
            State::PostMoveNumber => {
                if ch == b'.' {
                    self.state = State::PostMoveNumberHavePeriod;
                } else if !is_space(ch) {
                    events.push(Event::Malformed(ParseError::BadMoveNumber));
                    self.state = State::Error;
                }
            }
            State::PostMoveNumberHavePeriod => {
                if ch == b'.' {
                    self.state = State::PostMoveNumberBlack;
                } else {
                    push_back = Some(ch);
                    self.state = State::PreMoveWhite;
                }
            }
            State::PostMoveNumberBlack => {
                if ch != b'.' {
                    push_back = Some(ch);
                    self.state = State::PreMoveBlack;
                }
            }
            State::Error => {
                if ch == b'[' {
                    push_back = Some(ch);
                    self.state = State::Prefix;
                }
            }
            State::PreMoveWhite | State::PreMoveBlack => {
                if ch == b'[' {
                    push_back = Some(ch);
                    self.state = State::Prefix;
                } else if ch.is_ascii_digit() {
                    push_back = Some(ch);
                    self.state = State::MoveNumber;
                } else if !is_space(ch) {
                    push_back = Some(ch);
                    self.state = if self.state == State::PreMoveWhite {
                        State::InMoveWhite
                    } else {
                        State::InMoveBlack
                    };
                }
            }
            State::InMoveWhite | State::InMoveBlack => {
                let white = self.state == State::InMoveWhite;
                if ch == b'[' {
                    push_back = Some(ch);
                    self.state = State::Prefix;
                } else if is_space(ch) || matches!(ch, b'(' | b')' | b'{' | b'}' | b'$') {
                    let token = std::mem::take(&mut self.buf);
                    if token.is_empty() {
                        // stray closing brace, nothing to play
                        self.state = if white {
                            State::PreMoveWhite
                        } else {
                            State::PreMoveBlack
                        };
                        return None;
                    }
                    if self.is_result(&token) {
                        self.state = State::Prefix;
                    } else {
                        events.push(Event::Move {
                            white,
                            move_number: self.move_number,
                            token,
                        });
                        self.state = if white {
                            State::PreMoveBlack
                        } else {
                            State::BetweenMoves
                        };
                    }
                    if !is_space(ch) {
                        push_back = Some(ch);
                    }
                } else {
                    self.accumulate(ch, events);
                }
            }
            State::BetweenMoves => {
                if ch == b'[' {
                    push_back = Some(ch);
                    self.state = State::Prefix;
                } else if ch.is_ascii_digit() {
                    push_back = Some(ch);
                    self.state = State::MoveNumber;
                }
            }
        }
        push_back
    }

    fn on_transition(&mut self, old_state: State, events: &mut Vec<Event>) {
        if old_state == State::Header {
            if let Some((tag, value)) = extract_tag(&self.buf) {
                if tag == Tag::Result {
                    self.declared_result = value.clone();
                }
                events.push(Event::Tag(tag, value));
            }
        }
        if matches!(
            self.state,
            State::Header | State::MoveNumber | State::InMoveWhite | State::InMoveBlack
        ) {
            self.buf.clear();
        }
        if self.state == State::Prefix {
            if old_state.in_game() {
                events.push(Event::GameOver);
            }
            if !matches!(old_state, State::Header | State::InComment | State::InDollar) {
                self.declared_result.clear();
                self.variations.clear();
                events.push(Event::GameBegin);
            }
        }
    }
}

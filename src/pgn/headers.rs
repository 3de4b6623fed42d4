//! Tag pair extraction for `[Key "Value"]` header lines.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Date,
    White,
    Black,
    Result,
    Eco,
    Site,
    Event,
    Desc,
    Desc2,
    Name,
    Variation,
    MoveOrder,
    Fen,
    FenReptor,
    Round,
    WhiteElo,
    BlackElo,
}

/// Known keys, matched as fixed prefixes of the raw header line.
const TAG_PREFIXES: [(&[u8], Tag); 17] = [
    (b"[Date ", Tag::Date),
    (b"[White ", Tag::White),
    (b"[Black ", Tag::Black),
    (b"[Result ", Tag::Result),
    (b"[ECO ", Tag::Eco),
    (b"[Site ", Tag::Site),
    (b"[Event ", Tag::Event),
    (b"[Desc ", Tag::Desc),
    (b"[Desc2 ", Tag::Desc2),
    (b"[Name ", Tag::Name),
    (b"[Variation ", Tag::Variation),
    (b"[MoveOrder ", Tag::MoveOrder),
    (b"[FEN ", Tag::Fen),
    (b"[FENreptor ", Tag::FenReptor),
    (b"[Round ", Tag::Round),
    (b"[WhiteElo ", Tag::WhiteElo),
    (b"[BlackElo ", Tag::BlackElo),
];

impl Tag {
    /// Date, ECO, site and event values stop at the first character outside
    /// a conservative set; everything else runs to the closing quote.
    fn is_restricted(self) -> bool {
        matches!(self, Tag::Date | Tag::Eco | Tag::Site | Tag::Event)
    }
}

#[inline]
fn is_restricted_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'.' | b' ' | b'-' | b'/')
}

/// Extracts the tag and its value from a raw header line such as
/// `[White "Piket, Jeroen"]`. Unknown keys and lines without an opening quote
/// yield `None`. A missing closing quote ends the value at the end of the
/// line.
pub fn extract_tag(line: &[u8]) -> Option<(Tag, String)> {
    let (prefix, tag) = TAG_PREFIXES
        .iter()
        .find(|(prefix, _)| line.starts_with(prefix))?;
    let rest = &line[prefix.len()..];
    let open = rest.iter().position(|&c| c == b'"')?;
    let value = &rest[open + 1..];
    let end = if tag.is_restricted() {
        value.iter().position(|&c| !is_restricted_char(c))
    } else {
        value.iter().position(|&c| c == b'"')
    }
    .unwrap_or(value.len());
    Some((*tag, String::from_utf8_lossy(&value[..end]).into_owned()))
}

/// Metadata of the game currently being read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GameHeaders {
    pub event: String,
    pub site: String,
    pub date: String,
    pub round: String,
    pub white: String,
    pub black: String,
    pub result: String,
    pub white_elo: String,
    pub black_elo: String,
    pub eco: String,
    pub desc: String,
    pub desc2: String,
    pub name: String,
    pub variation: String,
    pub move_order: String,
    pub fen: String,
}

impl GameHeaders {
    /// Stores `value` in the slot for `tag`. Returns `true` when the tag set
    /// up a new starting position.
    ///
    /// `FEN` only applies if no setup was seen yet, `FENreptor` always wins.
    pub fn apply(&mut self, tag: Tag, value: String) -> bool {
        let slot = match tag {
            Tag::Date => &mut self.date,
            Tag::White => &mut self.white,
            Tag::Black => &mut self.black,
            Tag::Result => &mut self.result,
            Tag::Eco => &mut self.eco,
            Tag::Site => &mut self.site,
            Tag::Event => &mut self.event,
            Tag::Desc => &mut self.desc,
            Tag::Desc2 => &mut self.desc2,
            Tag::Name => &mut self.name,
            Tag::Variation => &mut self.variation,
            Tag::MoveOrder => &mut self.move_order,
            Tag::Round => &mut self.round,
            Tag::WhiteElo => &mut self.white_elo,
            Tag::BlackElo => &mut self.black_elo,
            Tag::Fen | Tag::FenReptor => {
                if tag == Tag::Fen && !self.fen.is_empty() {
                    return false;
                }
                self.fen = value;
                return true;
            }
        };
        *slot = value;
        false
    }

    pub fn has_setup(&self) -> bool {
        !self.fen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_free_text_values() {
        assert_eq!(
            extract_tag(br#"[White "Piket, Jeroen"]"#),
            Some((Tag::White, "Piket, Jeroen".to_string()))
        );
        assert_eq!(
            extract_tag(br#"[Result "1/2-1/2"]"#),
            Some((Tag::Result, "1/2-1/2".to_string()))
        );
    }

    #[test]
    fn restricted_values_stop_at_odd_characters() {
        assert_eq!(
            extract_tag(br#"[Date "1984.08.04"]"#),
            Some((Tag::Date, "1984.08.04".to_string()))
        );
        assert_eq!(
            extract_tag(br#"[Site "Wijk aan Zee, NED"]"#),
            Some((Tag::Site, "Wijk aan Zee".to_string()))
        );
    }

    #[test]
    fn unterminated_value_runs_to_end_of_line() {
        assert_eq!(
            extract_tag(br#"[Black "Anand, Viswanathan"#),
            Some((Tag::Black, "Anand, Viswanathan".to_string()))
        );
        assert_eq!(extract_tag(b"[White Carlsen]"), None);
    }

    #[test]
    fn prefix_match_distinguishes_similar_keys() {
        assert_eq!(extract_tag(br#"[WhiteElo "2700"]"#).unwrap().0, Tag::WhiteElo);
        assert_eq!(extract_tag(br#"[FENreptor "8/8 w"]"#).unwrap().0, Tag::FenReptor);
        assert_eq!(extract_tag(br#"[EventDate "1984.??.??"]"#), None);
    }

    #[test]
    fn first_fen_sticks_unless_reptor() {
        let mut headers = GameHeaders::default();
        assert!(headers.apply(Tag::Fen, "first".to_string()));
        assert!(!headers.apply(Tag::Fen, "second".to_string()));
        assert_eq!(headers.fen, "first");
        assert!(headers.apply(Tag::FenReptor, "third".to_string()));
        assert_eq!(headers.fen, "third");
    }
}

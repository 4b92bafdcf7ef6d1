//! Scene narration: coarse position/distance buckets, object descriptions
//! and the spoken summary sentence.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Sentence used when a scan produced no descriptions
pub const NO_OBJECTS_SENTENCE: &str = "I did not detect any objects.";

/// Horizontal zone of the frame an object sits in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Left,
    Center,
    Right,
}

impl Position {
    /// Classify a horizontal pixel coordinate against thirds of the frame width.
    ///
    /// `frame_width` must be positive; anything else is the caller's bug.
    pub fn classify(x: f64, frame_width: f64) -> Self {
        if x < frame_width / 3.0 {
            Position::Left
        } else if x < 2.0 * frame_width / 3.0 {
            Position::Center
        } else {
            Position::Right
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Left => "left",
            Position::Center => "center",
            Position::Right => "right",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rough distance estimate from how low in the frame an object's center is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Distance {
    VeryClose,
    Close,
    ABitFar,
    FarAway,
}

impl Distance {
    /// Classify a vertical pixel coordinate by its ratio to the frame height.
    pub fn classify(y: f64, frame_height: f64) -> Self {
        let ratio = y / frame_height;
        if ratio > 0.75 {
            Distance::VeryClose
        } else if ratio > 0.55 {
            Distance::Close
        } else if ratio > 0.35 {
            Distance::ABitFar
        } else {
            Distance::FarAway
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Distance::VeryClose => "very close",
            Distance::Close => "close",
            Distance::ABitFar => "a bit far",
            Distance::FarAway => "far away",
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One narrated fact about a detected object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Description {
    pub label: String,
    pub distance: Distance,
    pub position: Position,
}

impl Description {
    pub fn new(label: impl Into<String>, distance: Distance, position: Position) -> Self {
        Self {
            label: label.into(),
            distance,
            position,
        }
    }

    /// Description of an object whose center is at `(x, y)` in a frame of
    /// `width` x `height` pixels.
    pub fn locate(label: impl Into<String>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(label, Distance::classify(y, height), Position::classify(x, width))
    }

    /// Key used when collapsing repeated sightings within a summary.
    ///
    /// Distance is left out: the same object drifts between distance
    /// buckets from frame to frame, which would otherwise be narrated twice.
    pub fn summary_key(&self) -> (&str, Position) {
        (self.label.as_str(), self.position)
    }

    /// Text with the first letter upper-cased, for listing on screen
    pub fn capitalized(&self) -> String {
        let text = self.to_string();
        let mut chars = text.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => text,
        }
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} at your {}", self.label, self.distance, self.position)
    }
}

/// Ordered, deduplicated descriptions gathered during one scan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    items: Vec<Description>,
}

impl Summary {
    /// Collapse repeated (label, position) sightings, keeping the first one seen.
    pub fn from_descriptions<I>(descriptions: I) -> Self
    where
        I: IntoIterator<Item = Description>,
    {
        let mut seen: HashSet<(String, Position)> = HashSet::new();
        let mut items = Vec::new();
        for description in descriptions {
            let (label, position) = description.summary_key();
            if seen.insert((label.to_string(), position)) {
                items.push(description);
            }
        }
        Self { items }
    }

    pub fn items(&self) -> &[Description] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The sentence read aloud at the end of a scan
    pub fn sentence(&self) -> String {
        let texts: Vec<String> = self.items.iter().map(|d| d.to_string()).collect();
        compose_sentence(&texts)
    }
}

/// Join items into "I see X." / "I see X, Y, and Z.", or the fallback
/// sentence when there is nothing to say.
pub fn compose_sentence<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => NO_OBJECTS_SENTENCE.to_string(),
        [only] => format!("I see {}.", only.as_ref()),
        [rest @ .., last] => {
            let head: Vec<&str> = rest.iter().map(|s| s.as_ref()).collect();
            format!("I see {}, and {}.", head.join(", "), last.as_ref())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_boundaries() {
        assert_eq!(Position::classify(0.0, 600.0), Position::Left);
        assert_eq!(Position::classify(199.9, 600.0), Position::Left);
        assert_eq!(Position::classify(200.0, 600.0), Position::Center);
        assert_eq!(Position::classify(399.9, 600.0), Position::Center);
        assert_eq!(Position::classify(400.0, 600.0), Position::Right);
        assert_eq!(Position::classify(600.0, 600.0), Position::Right);
    }

    #[test]
    fn test_distance_boundaries() {
        assert_eq!(Distance::classify(76.0, 100.0), Distance::VeryClose);
        // Thresholds are strict
        assert_eq!(Distance::classify(75.0, 100.0), Distance::Close);
        assert_eq!(Distance::classify(55.0, 100.0), Distance::ABitFar);
        assert_eq!(Distance::classify(35.0, 100.0), Distance::FarAway);
        assert_eq!(Distance::classify(0.0, 100.0), Distance::FarAway);
    }

    #[test]
    fn test_description_text() {
        let d = Description::new("person", Distance::ABitFar, Position::Left);
        assert_eq!(d.to_string(), "person a bit far at your left");
        assert_eq!(d.capitalized(), "Person a bit far at your left");
    }

    #[test]
    fn test_locate() {
        let d = Description::locate("chair", 320.0, 400.0, 640.0, 480.0);
        assert_eq!(d.position, Position::Center);
        assert_eq!(d.distance, Distance::VeryClose);
    }

    #[test]
    fn test_sentence_forms() {
        let none: [&str; 0] = [];
        assert_eq!(compose_sentence(&none), NO_OBJECTS_SENTENCE);
        assert_eq!(compose_sentence(&["a dog"]), "I see a dog.");
        assert_eq!(compose_sentence(&["a", "b"]), "I see a, and b.");
        assert_eq!(compose_sentence(&["a", "b", "c"]), "I see a, b, and c.");
    }

    #[test]
    fn test_summary_keeps_first_distance() {
        let summary = Summary::from_descriptions(vec![
            Description::new("person", Distance::Close, Position::Left),
            Description::new("person", Distance::FarAway, Position::Left),
            Description::new("person", Distance::FarAway, Position::Right),
        ]);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary.items()[0].distance, Distance::Close);
        assert_eq!(summary.items()[1].position, Position::Right);
    }

    #[test]
    fn test_empty_summary_sentence() {
        let summary = Summary::default();
        assert!(summary.is_empty());
        assert_eq!(summary.sentence(), NO_OBJECTS_SENTENCE);
    }
}

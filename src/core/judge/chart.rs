use serde::{Serialize, Deserialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use crate::error::{Error, Result};
use crate::utils::MAX_PITCH;

fn default_duration() -> f64 {
    0.4
}

fn default_velocity() -> f32 {
    0.8
}

/// One expected note in a chart, times in seconds from chart start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartNote {
    pub pitch: u8,
    pub time: f64,
    #[serde(default = "default_duration")]
    pub duration: f64,
    #[serde(default = "default_velocity")]
    pub velocity: f32,
}

/// A playable note schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    #[serde(default)]
    pub title: String,
    pub notes: Vec<ChartNote>,
}

impl Chart {
    pub fn new(title: &str, notes: Vec<ChartNote>) -> Self {
        Self { title: title.to_string(), notes }
    }

    /// Load a chart from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let chart: Chart = serde_json::from_reader(BufReader::new(file))?;
        chart.validate()?;
        Ok(chart)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for (i, note) in self.notes.iter().enumerate() {
            if note.pitch > MAX_PITCH {
                return Err(Error::Chart(format!("note {} has pitch {}", i, note.pitch)));
            }
            if !note.time.is_finite() || note.time < 0.0 {
                return Err(Error::Chart(format!("note {} has invalid time {}", i, note.time)));
            }
            if !note.duration.is_finite() || note.duration < 0.0 {
                return Err(Error::Chart(format!("note {} has invalid duration {}", i, note.duration)));
            }
        }
        Ok(())
    }

    /// Same chart with every note moved `seconds` later
    pub fn delayed(mut self, seconds: f64) -> Self {
        for note in self.notes.iter_mut() {
            note.time += seconds;
        }
        self
    }

    /// Target time of the last note plus its duration
    pub fn end_time(&self) -> f64 {
        self.notes
            .iter()
            .map(|n| n.time + n.duration)
            .fold(0.0, f64::max)
    }
}

const RIFF_PHRASES: [[u8; 9]; 8] = [
    [62, 62, 74, 69, 68, 65, 62, 58, 60],
    [62, 62, 74, 69, 68, 65, 62, 58, 60],
    [65, 65, 77, 72, 71, 68, 65, 61, 63],
    [62, 62, 74, 69, 68, 65, 62, 58, 60],
    [67, 67, 79, 74, 73, 70, 67, 63, 65],
    [69, 69, 81, 76, 75, 72, 69, 65, 67],
    [65, 65, 77, 72, 71, 68, 65, 61, 63],
    [62, 62, 74, 69, 68, 65, 62, 58, 60],
];

const PHRASE_OFFSETS: [f64; 9] = [0.0, 0.5, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
const PHRASE_LENGTH: f64 = 8.0;

/// Built-in eight-phrase riff used when no chart file is given
pub fn demo_riff() -> Chart {
    let notes = RIFF_PHRASES
        .iter()
        .enumerate()
        .flat_map(|(phrase, pitches)| {
            let base = phrase as f64 * PHRASE_LENGTH;
            pitches.iter().zip(PHRASE_OFFSETS.iter()).map(move |(&pitch, &offset)| ChartNote {
                pitch,
                time: base + offset,
                duration: default_duration(),
                velocity: default_velocity(),
            })
        })
        .collect();
    Chart::new("Demo riff", notes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_riff_layout() {
        let chart = demo_riff();
        assert_eq!(chart.notes.len(), 72);
        assert_eq!(chart.notes[0], ChartNote { pitch: 62, time: 0.0, duration: 0.4, velocity: 0.8 });
        assert_eq!(chart.notes[1].time, 0.5);
        assert_eq!(chart.notes[8].time, 7.0);
        assert_eq!(chart.notes[9].time, 8.0);
        assert_eq!(chart.notes[71].time, 63.0);
        assert!(chart.notes.windows(2).all(|w| w[0].time < w[1].time));
    }

    #[test]
    fn test_json_defaults_and_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.json");
        std::fs::write(&path, r#"{"title":"t","notes":[{"pitch":60,"time":1.5}]}"#).unwrap();

        let chart = Chart::load_from_file(&path).unwrap();
        assert_eq!(chart.notes[0].duration, 0.4);
        assert_eq!(chart.notes[0].velocity, 0.8);

        chart.save_to_file(&path).unwrap();
        assert_eq!(Chart::load_from_file(&path).unwrap(), chart);
    }

    #[test]
    fn test_invalid_pitch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"notes":[{"pitch":200,"time":0.0}]}"#).unwrap();
        assert!(matches!(Chart::load_from_file(&path), Err(Error::Chart(_))));
    }

    #[test]
    fn test_delayed_shifts_every_note() {
        let chart = demo_riff().delayed(2.0);
        assert_eq!(chart.notes[0].time, 2.0);
        assert!((chart.end_time() - 65.4).abs() < 1e-9);
    }
}

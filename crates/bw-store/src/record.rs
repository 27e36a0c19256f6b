//! Serialized block references

use std::path::PathBuf;

use bw_core::SampleCount;
use serde::{Deserialize, Serialize};

/// Persisted reference to one block file, as stored in a sequence record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlockRecord {
    /// Block with its own samples in the project directory
    Simple { name: String },
    /// Summary in the project directory, samples in an external file
    Alias {
        name: String,
        #[serde(rename = "aliaspath")]
        path: PathBuf,
        #[serde(rename = "aliasstart")]
        start: SampleCount,
        #[serde(rename = "aliaslen")]
        len: usize,
        #[serde(rename = "aliaschannel")]
        channel: u16,
    },
    /// Block still waiting for its decode when saved
    Decode {
        name: String,
        #[serde(rename = "sourcepath")]
        path: PathBuf,
        #[serde(rename = "sourcestart")]
        start: SampleCount,
        #[serde(rename = "sourcelen")]
        len: usize,
        #[serde(rename = "sourcechannel")]
        channel: u16,
    },
    /// Silence with no backing file
    Silent { len: usize },
}

impl BlockRecord {
    /// File name, for records that have one
    pub fn name(&self) -> Option<&str> {
        match self {
            BlockRecord::Simple { name }
            | BlockRecord::Alias { name, .. }
            | BlockRecord::Decode { name, .. } => Some(name),
            BlockRecord::Silent { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_record_field_names() {
        let record = BlockRecord::Alias {
            name: "b00003.auf".into(),
            path: PathBuf::from("/audio/take1.wav"),
            start: 44100,
            len: 1000,
            channel: 1,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "alias");
        assert_eq!(json["aliaspath"], "/audio/take1.wav");
        assert_eq!(json["aliasstart"], 44100);
        assert_eq!(json["aliaschannel"], 1);

        let parsed: BlockRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(parsed.name(), Some("b00003.auf"));
    }

    #[test]
    fn test_silent_has_no_name() {
        let record: BlockRecord = serde_json::from_str(r#"{"type":"silent","len":12}"#).unwrap();
        assert_eq!(record, BlockRecord::Silent { len: 12 });
        assert_eq!(record.name(), None);
    }
}

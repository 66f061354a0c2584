use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the two chat identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParticipantsError {
    #[error("expected exactly two participants, got {0}")]
    WrongCount(usize),
    #[error("malformed participant entry '{0}', expected id:name")]
    Malformed(String),
    #[error("participant ids must differ, both are '{0}'")]
    DuplicateId(String),
}

/// The fixed pair of participants, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participants {
    pair: [Participant; 2],
}

impl Participants {
    pub fn new(first: Participant, second: Participant) -> Result<Self, ParticipantsError> {
        if first.id == second.id {
            return Err(ParticipantsError::DuplicateId(first.id));
        }
        Ok(Self {
            pair: [first, second],
        })
    }

    /// Parse `"9492:Rahitha,9746:Guest"`.
    pub fn parse(list: &str) -> Result<Self, ParticipantsError> {
        let entries: Vec<&str> = list
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .collect();
        if entries.len() != 2 {
            return Err(ParticipantsError::WrongCount(entries.len()));
        }

        let parse_one = |entry: &str| -> Result<Participant, ParticipantsError> {
            let (id, name) = entry
                .split_once(':')
                .ok_or_else(|| ParticipantsError::Malformed(entry.to_string()))?;
            let (id, name) = (id.trim(), name.trim());
            if id.is_empty() || name.is_empty() {
                return Err(ParticipantsError::Malformed(entry.to_string()));
            }
            Ok(Participant {
                id: id.to_string(),
                name: name.to_string(),
            })
        };

        Self::new(parse_one(entries[0])?, parse_one(entries[1])?)
    }

    pub fn get(&self, id: &str) -> Option<&Participant> {
        self.pair.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// The other participant. `None` if `id` is not one of the pair.
    pub fn counterpart(&self, id: &str) -> Option<&Participant> {
        match self.pair.iter().position(|p| p.id == id)? {
            0 => Some(&self.pair[1]),
            _ => Some(&self.pair[0]),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.pair.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pair() {
        let p = Participants::parse("9492:Rahitha, 9746:Guest").unwrap();
        assert_eq!(p.get("9492").unwrap().name, "Rahitha");
        assert_eq!(p.counterpart("9492").unwrap().id, "9746");
        assert_eq!(p.counterpart("9746").unwrap().id, "9492");
        assert!(p.counterpart("0000").is_none());
        assert!(!p.contains("0000"));
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!(
            Participants::parse("9492:Rahitha"),
            Err(ParticipantsError::WrongCount(1))
        );
        assert_eq!(
            Participants::parse("1:a,2:b,3:c"),
            Err(ParticipantsError::WrongCount(3))
        );
        assert_eq!(
            Participants::parse("9492,9746:Guest"),
            Err(ParticipantsError::Malformed("9492".into()))
        );
        assert_eq!(
            Participants::parse("9492:A,9492:B"),
            Err(ParticipantsError::DuplicateId("9492".into()))
        );
    }
}

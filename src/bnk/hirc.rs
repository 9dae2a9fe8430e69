//! HIRC (hierarchy) section objects.
//!
//! The HIRC section lists the bank's runtime objects: events, event actions,
//! sound effects/voices, and various container types. Only the object kinds
//! needed for event resolution and streamed-WEM detection are decoded; other
//! kinds keep just their id so they can still be referenced as parents.

use std::borrow::Cow;
use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Error, Result};

/// HIRC object type byte for sound effects/voices.
pub const OBJECT_TYPE_SOUND: u8 = 2;
/// HIRC object type byte for event actions.
pub const OBJECT_TYPE_EVENT_ACTION: u8 = 3;
/// HIRC object type byte for events.
pub const OBJECT_TYPE_EVENT: u8 = 4;

/// What an event action does to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Stop,
    Pause,
    Resume,
    Play,
    Other(u8),
}

impl ActionKind {
    /// Decode the action type byte.
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0x01 => ActionKind::Stop,
            0x02 => ActionKind::Pause,
            0x03 => ActionKind::Resume,
            0x04 => ActionKind::Play,
            other => ActionKind::Other(other),
        }
    }

    /// Human-readable label; unknown types render as their decimal value.
    pub fn label(&self) -> Cow<'static, str> {
        match self {
            ActionKind::Stop => Cow::Borrowed("stop"),
            ActionKind::Pause => Cow::Borrowed("pause"),
            ActionKind::Resume => Cow::Borrowed("resume"),
            ActionKind::Play => Cow::Borrowed("play"),
            ActionKind::Other(raw) => Cow::Owned(raw.to_string()),
        }
    }
}

/// A sound effect or voice object.
#[derive(Debug, Clone)]
pub struct Sound {
    /// ID of the WEM this sound plays
    pub audio_file_id: u32,
    /// 0 = embedded in this bank, nonzero = streamed from an external .wem
    pub included_or_streamed: u32,
    /// Raw sound structure blob (parent id lives inside, see [`parent_id`])
    pub sound_structure: Vec<u8>,
}

/// An event action linking an event to a target object.
#[derive(Debug, Clone, Copy)]
pub struct EventAction {
    pub action_type: ActionKind,
    /// Object the action applies to; 0 means no target
    pub target_object_id: u32,
}

/// An event referencing its actions by id.
#[derive(Debug, Clone)]
pub struct Event {
    pub action_ids: Vec<u32>,
}

/// One object from the HIRC section.
#[derive(Debug, Clone)]
pub struct HircObject {
    pub id: u32,
    pub kind: HircKind,
}

/// Decoded object payload.
#[derive(Debug, Clone)]
pub enum HircKind {
    Sound(Sound),
    EventAction(EventAction),
    Event(Event),
    /// Containers and other kinds; only the id matters for parent resolution
    Other { object_type: u8 },
}

/// Extract the parent object id from a sound structure blob.
///
/// Layout: byte 0 is the override-parent-effects flag, byte 1 the effect
/// count. When effects are present, one bypass bitmask byte plus 7 bytes per
/// effect follow. After a 4-byte bus id comes the 4-byte LE parent id.
/// Returns 0 when the blob is shorter than the computed offset.
pub fn parent_id(sound_structure: &[u8]) -> u32 {
    if sound_structure.len() < 2 {
        return 0;
    }

    let num_effects = sound_structure[1] as usize;
    let mut offset = 6;
    if num_effects > 0 {
        offset += 1 + 7 * num_effects;
    }

    match sound_structure.get(offset..offset + 4) {
        Some(bytes) => u32::from_le_bytes(bytes.try_into().unwrap()),
        None => 0,
    }
}

/// Parse the HIRC section payload into its object list.
pub fn parse_hirc(payload: &[u8]) -> Result<Vec<HircObject>> {
    let mut cursor = Cursor::new(payload);
    let num_objects = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::truncated("HIRC object count"))?;

    let mut objects = Vec::with_capacity(num_objects.min(0x10000) as usize);

    for _ in 0..num_objects {
        let object_type = cursor
            .read_u8()
            .map_err(|_| Error::truncated("HIRC object header"))?;
        let size = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::truncated("HIRC object header"))?;
        let id = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::truncated("HIRC object header"))?;

        if size < 4 {
            return Err(Error::parse("HIRC object size smaller than its id"));
        }
        let body_len = (size - 4) as usize;
        let start = cursor.position() as usize;
        let body = payload
            .get(start..start + body_len)
            .ok_or_else(|| Error::truncated("HIRC object body"))?;
        cursor.set_position((start + body_len) as u64);

        let kind = match object_type {
            OBJECT_TYPE_SOUND => parse_sound(body)?,
            OBJECT_TYPE_EVENT_ACTION => parse_event_action(body)?,
            OBJECT_TYPE_EVENT => parse_event(body)?,
            other => HircKind::Other { object_type: other },
        };

        objects.push(HircObject { id, kind });
    }

    Ok(objects)
}

/// Sound object body: 4 unknown bytes, streamed flag, audio file id, source
/// id, embed location when not streamed, sound type byte, then the sound
/// structure blob.
fn parse_sound(body: &[u8]) -> Result<HircKind> {
    let mut cursor = Cursor::new(body);
    let mut unknown = [0u8; 4];
    cursor
        .read_exact(&mut unknown)
        .map_err(|_| Error::truncated("sound object"))?;

    let included_or_streamed = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::truncated("sound object"))?;
    let audio_file_id = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::truncated("sound object"))?;
    let _source_id = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::truncated("sound object"))?;

    if included_or_streamed == 0 {
        let _data_offset = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::truncated("sound object"))?;
        let _data_size = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::truncated("sound object"))?;
    }

    let _sound_type = cursor
        .read_u8()
        .map_err(|_| Error::truncated("sound object"))?;

    let sound_structure = body[cursor.position() as usize..].to_vec();

    Ok(HircKind::Sound(Sound {
        audio_file_id,
        included_or_streamed,
        sound_structure,
    }))
}

/// Event action body: scope byte, action type byte, 4-byte target object id.
/// Parameters past the target are not needed here.
fn parse_event_action(body: &[u8]) -> Result<HircKind> {
    let mut cursor = Cursor::new(body);
    let _scope = cursor
        .read_u8()
        .map_err(|_| Error::truncated("event action object"))?;
    let action_type = cursor
        .read_u8()
        .map_err(|_| Error::truncated("event action object"))?;
    let target_object_id = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::truncated("event action object"))?;

    Ok(HircKind::EventAction(EventAction {
        action_type: ActionKind::from_raw(action_type),
        target_object_id,
    }))
}

/// Event body: 4-byte action count followed by that many action ids.
fn parse_event(body: &[u8]) -> Result<HircKind> {
    let mut cursor = Cursor::new(body);
    let count = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::truncated("event object"))?;

    let mut action_ids = Vec::with_capacity(count.min(0x10000) as usize);
    for _ in 0..count {
        action_ids.push(
            cursor
                .read_u32::<LittleEndian>()
                .map_err(|_| Error::truncated("event object"))?,
        );
    }

    Ok(HircKind::Event(Event { action_ids }))
}

//! Event-to-audio reporting.
//!
//! Resolves the `event -> event action -> sound (or parent container)`
//! reference chains in a bank's HIRC section and renders them as text. All
//! references are resolved through id-indexed maps built in one pass over
//! the object list.

use std::collections::{BTreeMap, HashMap};

use crate::bnk::hirc::{parent_id, ActionKind, HircKind};
use crate::bnk::Soundbank;

/// One resolved action/sound pair for an event.
struct EventSfx {
    action_type: ActionKind,
    audio_file_id: u32,
    is_child: bool,
}

impl Soundbank<'_> {
    /// Report which audio files each event triggers.
    ///
    /// With a non-empty `event_id_filter`, only the event whose decimal id
    /// matches the string is resolved; the total event count still covers
    /// the whole bank. Returns an empty string when the bank has no HIRC
    /// section.
    pub fn event_report(&self, event_id_filter: &str) -> String {
        let Some(objects) = self.objects.as_deref() else {
            return String::new();
        };

        let actions_by_id: HashMap<u32, _> = objects
            .iter()
            .filter_map(|obj| match &obj.kind {
                HircKind::EventAction(action) => Some((obj.id, action)),
                _ => None,
            })
            .collect();

        // Pass 1: events -> their actions, indexed by target object id.
        // Actions without a target are dropped. `seq` preserves per-event
        // action order for the rendering pass.
        let mut num_events = 0usize;
        let mut by_target: HashMap<u32, Vec<(usize, u32, ActionKind)>> = HashMap::new();
        let mut seq = 0usize;

        for obj in objects {
            let HircKind::Event(event) = &obj.kind else {
                continue;
            };
            num_events += 1;

            if !event_id_filter.is_empty() && obj.id.to_string() != event_id_filter {
                continue;
            }

            for action_id in &event.action_ids {
                if let Some(action) = actions_by_id.get(action_id) {
                    if action.target_object_id != 0 {
                        by_target
                            .entry(action.target_object_id)
                            .or_default()
                            .push((seq, obj.id, action.action_type));
                        seq += 1;
                    }
                }
            }
        }

        // Pass 2: match sounds against action targets, directly by id or
        // through the sound's parent container.
        let mut event_sfxs: BTreeMap<u32, Vec<EventSfx>> = BTreeMap::new();

        for obj in objects {
            let HircKind::Sound(sound) = &obj.kind else {
                continue;
            };
            let parent = parent_id(&sound.sound_structure);

            let mut hits: Vec<(usize, u32, ActionKind, bool)> = Vec::new();
            if let Some(list) = by_target.get(&obj.id) {
                hits.extend(list.iter().map(|&(s, e, t)| (s, e, t, obj.id == parent)));
            }
            if parent != obj.id {
                if let Some(list) = by_target.get(&parent) {
                    hits.extend(list.iter().map(|&(s, e, t)| (s, e, t, true)));
                }
            }
            hits.sort_by_key(|&(s, _, _, _)| s);

            for (_, event_id, action_type, is_child) in hits {
                event_sfxs.entry(event_id).or_default().push(EventSfx {
                    action_type,
                    audio_file_id: sound.audio_file_id,
                    is_child,
                });
            }
        }

        // Pass 3: render.
        let mut out = String::new();
        out.push_str(&format!("Found {num_events} event(s)\n"));
        out.push_str(&format!(
            "{} of them point to files in this BNK\n\n",
            event_sfxs.len()
        ));

        for (event_id, sfxs) in &event_sfxs {
            let name = self.name_of(*event_id).filter(|n| !n.is_empty());
            out.push_str(&format!(
                "{} ({})\n",
                event_id,
                name.unwrap_or("can't find name")
            ));

            for sfx in sfxs {
                out.push_str(&format!(
                    "\t{} {}{}\n",
                    sfx.action_type.label(),
                    sfx.audio_file_id,
                    if sfx.is_child { " (child)" } else { "" }
                ));
            }
            out.push('\n');
        }

        out
    }
}

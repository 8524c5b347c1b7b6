// Item roster: the ordered list of equipment lines a user intends to book
// This is the only component holding state across calls; everything else is derived from a snapshot

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::inventory::CatalogItem;

// Which kind of equipment line the roster holds
// Core lines belong to the activity, extra lines are requested on top of it at booking time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RosterKind {
    Core,
    Extra,
}

impl RosterKind {
    // Prefix of the form field / query parameter carrying a line's quantity
    pub fn quantity_prefix(&self) -> &'static str {
        match self {
            RosterKind::Core => "qty_",
            RosterKind::Extra => "eqty_",
        }
    }

    // Prefix of the element ids used when the roster is projected into a view
    pub fn view_prefix(&self) -> &'static str {
        match self {
            RosterKind::Core => "item",
            RosterKind::Extra => "extra",
        }
    }
}

// One requested item line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub presentation_id: usize,
    pub item_id: String,
    pub name: String,
    pub quantity: u32,
    pub max_quantity: u32,
}

#[derive(Debug, Clone)]
pub struct ItemRoster {
    kind: RosterKind,
    entries: Vec<RosterEntry>,
}

impl Default for ItemRoster {
    fn default() -> Self {
        Self::new(RosterKind::Extra)
    }
}

impl ItemRoster {
    pub fn new(kind: RosterKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    pub fn kind(&self) -> RosterKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, presentation_id: usize) -> Option<&RosterEntry> {
        // Ids are contiguous from 1, so the id doubles as a position
        presentation_id
            .checked_sub(1)
            .and_then(|index| self.entries.get(index))
    }

    pub fn quantity_key(&self, item_id: &str) -> String {
        format!("{}{}", self.kind.quantity_prefix(), item_id)
    }

    // Append a new line with the next presentation id and quantity 1, capped at max_quantity
    // Returns the assigned id, or None when no catalog item was supplied
    pub fn add_item(&mut self, item_id: &str, name: &str, max_quantity: u32) -> Option<usize> {
        if item_id.is_empty() {
            debug!(item_name = name, "ignoring roster insert without an item id");
            return None;
        }

        let presentation_id = self.entries.len() + 1;
        self.entries.push(RosterEntry {
            presentation_id,
            item_id: item_id.to_string(),
            name: name.to_string(),
            quantity: 1.min(max_quantity),
            max_quantity,
        });

        debug!(presentation_id, item_id, max_quantity, "roster line added");
        Some(presentation_id)
    }

    // Picker entry point: the bound is what the inventory says can actually be booked
    pub fn add_catalog_item(&mut self, item: &CatalogItem) -> Option<usize> {
        self.add_item(&item.id.to_string(), &item.name, item.bookable_quantity())
    }

    // Remove a line and close the gap it leaves
    // Returns the removed entry; unknown ids leave the roster untouched
    pub fn remove_item(&mut self, presentation_id: usize) -> Option<RosterEntry> {
        let index = self
            .entries
            .iter()
            .position(|e| e.presentation_id == presentation_id)?;
        let removed = self.entries.remove(index);

        // Single pass over the tail; nothing observes the roster until we return
        for entry in self.entries.iter_mut().skip(index) {
            entry.presentation_id -= 1;
        }

        debug!(
            presentation_id,
            item_id = %removed.item_id,
            remaining = self.entries.len(),
            "roster line removed"
        );
        Some(removed)
    }

    // Bounds are checked by the form layer before this is called
    pub fn update_quantity(&mut self, presentation_id: usize, quantity: u32) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|e| e.presentation_id == presentation_id)
        {
            Some(entry) => {
                entry.quantity = quantity;
                true
            }
            None => false,
        }
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn snapshot(&self) -> Vec<RosterEntry> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn assert_contiguous(roster: &ItemRoster) {
        let ids: Vec<usize> = roster.entries().iter().map(|e| e.presentation_id).collect();
        let expected: Vec<usize> = (1..=roster.len()).collect();
        assert_eq!(ids, expected, "presentation ids must run 1..N without gaps");
    }

    fn sample_roster() -> ItemRoster {
        let mut roster = ItemRoster::new(RosterKind::Extra);
        roster.add_item("ruler", "30cm ruler", 10);
        roster.add_item("beaker", "250ml beaker", 20);
        roster.add_item("burner", "Bunsen burner", 15);
        roster
    }

    #[test]
    fn test_add_item_assigns_next_id() {
        let mut roster = ItemRoster::default();
        assert_eq!(roster.add_item("ruler", "30cm ruler", 10), Some(1));
        assert_eq!(roster.add_item("beaker", "250ml beaker", 20), Some(2));

        let entry = roster.get(2).unwrap();
        assert_eq!(entry.item_id, "beaker");
        assert_eq!(entry.quantity, 1);
        assert_eq!(entry.max_quantity, 20);
        assert_contiguous(&roster);
    }

    #[test]
    fn test_add_item_without_id_is_ignored() {
        let mut roster = ItemRoster::default();
        assert_eq!(roster.add_item("", "Nameless", 5), None);
        assert!(roster.is_empty());
    }

    #[test]
    fn test_add_duplicate_item_appends_second_line() {
        let mut roster = ItemRoster::default();
        roster.add_item("ruler", "30cm ruler", 10);
        roster.add_item("ruler", "30cm ruler", 10);
        assert_eq!(roster.len(), 2);
        assert_contiguous(&roster);
    }

    #[test]
    fn test_remove_first_shifts_others_down() {
        let mut roster = sample_roster();
        let removed = roster.remove_item(1).unwrap();
        assert_eq!(removed.item_id, "ruler");

        let order: Vec<(usize, &str)> = roster
            .entries()
            .iter()
            .map(|e| (e.presentation_id, e.item_id.as_str()))
            .collect();
        assert_eq!(order, vec![(1, "beaker"), (2, "burner")]);
    }

    #[test]
    fn test_remove_middle_and_last() {
        let mut roster = sample_roster();
        roster.remove_item(2);
        assert_contiguous(&roster);
        assert_eq!(roster.get(2).unwrap().item_id, "burner");

        roster.remove_item(2);
        assert_contiguous(&roster);
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let mut roster = sample_roster();
        assert!(roster.remove_item(0).is_none());
        assert!(roster.remove_item(7).is_none());
        assert_eq!(roster.len(), 3);
        assert_contiguous(&roster);
    }

    #[test]
    fn test_update_quantity() {
        let mut roster = sample_roster();
        assert!(roster.update_quantity(3, 4));
        assert_eq!(roster.get(3).unwrap().quantity, 4);

        // Unknown line
        assert!(!roster.update_quantity(9, 4));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut roster = sample_roster();
        let mut snapshot = roster.snapshot();
        snapshot[0].quantity = 99;
        snapshot.clear();

        assert_eq!(roster.len(), 3);
        assert_eq!(roster.get(1).unwrap().quantity, 1);

        // And the other direction
        let snapshot = roster.snapshot();
        roster.remove_item(1);
        assert_eq!(snapshot.len(), 3);
    }

    #[test]
    fn test_quantity_keys_follow_kind() {
        assert_eq!(ItemRoster::new(RosterKind::Core).quantity_key("7"), "qty_7");
        assert_eq!(ItemRoster::new(RosterKind::Extra).quantity_key("7"), "eqty_7");
    }

    #[test]
    fn test_add_catalog_item_uses_bookable_quantity() {
        let mut roster = ItemRoster::default();
        let mut item = CatalogItem {
            id: 12,
            name: "Oscilloscope".to_string(),
            description: String::new(),
            quantity: 4,
            available: true,
            hazard_voltage: true,
            hazard_toxic: false,
            hazard_lazer: false,
            hazard_misc: false,
        };
        roster.add_catalog_item(&item);
        item.available = false;
        roster.add_catalog_item(&item);

        assert_eq!(roster.get(1).unwrap().item_id, "12");
        assert_eq!(roster.get(1).unwrap().max_quantity, 4);
        assert_eq!(roster.get(1).unwrap().quantity, 1);

        // Nothing bookable, so the line starts empty rather than over its cap
        let unavailable = roster.get(2).unwrap();
        assert_eq!(unavailable.max_quantity, 0);
        assert_eq!(unavailable.quantity, 0);
        assert!(roster.entries().iter().all(|e| e.quantity <= e.max_quantity));
    }

    #[test]
    fn test_random_add_remove_sequences_stay_contiguous() {
        let mut rng = rand::thread_rng();

        for _ in 0..50 {
            let mut roster = ItemRoster::default();
            let mut names: Vec<String> = Vec::new();

            for step in 0..200 {
                if roster.is_empty() || rng.gen_bool(0.6) {
                    let id = format!("item{}", step);
                    roster.add_item(&id, &id, 10);
                    names.push(id);
                } else {
                    let target = rng.gen_range(1..=roster.len());
                    roster.remove_item(target);
                    names.remove(target - 1);
                }

                assert_contiguous(&roster);
                // Relative order survives every removal
                let current: Vec<&str> =
                    roster.entries().iter().map(|e| e.item_id.as_str()).collect();
                assert_eq!(current, names.iter().map(String::as_str).collect::<Vec<_>>());
            }
        }
    }
}

use std::fmt;

use thiserror::Error;

/// A color index, `0..num_colors`.
pub type Item = usize;

/// A maximal run of one item. The first group of a vial is its top.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ItemGroup {
    pub item: Item,
    pub count: usize,
}

/// A bounded stack of item groups. Consecutive groups never share an item,
/// and the cached height always equals the sum of the group counts.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Vial {
    item_groups: Vec<ItemGroup>,
    height: usize,
}

impl Vial {
    pub fn new_empty() -> Self {
        Self {
            item_groups: Vec::new(),
            height: 0,
        }
    }

    /// Builds a vial from a flat item sequence, top item first.
    pub fn from_items(items: &[Item]) -> Self {
        let mut item_groups: Vec<ItemGroup> = Vec::new();
        for &item in items {
            match item_groups.last_mut() {
                Some(group) if group.item == item => group.count += 1,
                _ => item_groups.push(ItemGroup { item, count: 1 }),
            }
        }
        Self {
            item_groups,
            height: items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.item_groups.is_empty()
    }

    /// A vial holding exactly one run of one color. Moving it into an empty
    /// vial gains nothing.
    pub fn is_sorted(&self) -> bool {
        self.item_groups.len() == 1
    }

    pub fn get_height(&self) -> usize {
        self.height
    }

    pub fn get_top(&self) -> Option<&ItemGroup> {
        self.item_groups.first()
    }

    pub fn get_item_groups(&self) -> &[ItemGroup] {
        &self.item_groups
    }

    /// The vial expanded to its flat item sequence, top item first.
    pub fn flat_items(&self) -> Vec<Item> {
        let mut items = Vec::with_capacity(self.height);
        for group in &self.item_groups {
            for _ in 0..group.count {
                items.push(group.item);
            }
        }
        items
    }

    /// Removes `amount` items from the top group. The caller guarantees the
    /// group holds at least that many.
    pub(crate) fn drain_top(&mut self, amount: usize) {
        self.item_groups[0].count -= amount;
        if self.item_groups[0].count == 0 {
            self.item_groups.remove(0);
        }
        self.height -= amount;
    }

    /// Stacks `amount` items on top, extending the top group when the item
    /// matches and opening a new group otherwise.
    pub(crate) fn stack_top(&mut self, item: Item, amount: usize) {
        match self.item_groups.first_mut() {
            Some(group) if group.item == item => group.count += amount,
            _ => self.item_groups.insert(0, ItemGroup { item, count: amount }),
        }
        self.height += amount;
    }
}

/// Per-puzzle parameters, fixed for the lifetime of an analysis session.
///
/// The winning arrangement is one full single-color vial per color plus
/// `empty_vials` empty ones, so a state's vial count must equal
/// `num_colors + empty_vials` for winnability queries to be meaningful.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct StaticParams {
    pub vial_height: usize,
    pub num_colors: usize,
    pub empty_vials: usize,
}

/// One puzzle configuration. Treated as immutable: every move produces a new
/// state and carries unaffected vials over.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct GameState {
    pub vials: Vec<Vial>,
    pub params: StaticParams,
}

/// Canonical, vial-order-independent fingerprint of a configuration.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct StateId(String);

impl StateId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("vial {index} holds {height} items but the vial height is {vial_height}")]
    VialTooTall {
        index: usize,
        height: usize,
        vial_height: usize,
    },
    #[error("unrecognized item token {token:?}")]
    UnknownToken { token: char },
    #[error("{num_colors} colors cannot fit a winning arrangement into {vials} vials")]
    MoreColorsThanVials { num_colors: usize, vials: usize },
}

impl GameState {
    pub fn new(vials: Vec<Vial>, params: StaticParams) -> Self {
        Self { vials, params }
    }

    /// Turns a level description (flat top-first item lists, one per filled
    /// vial) into a playable state, appending `params.empty_vials` empty
    /// vials.
    pub fn from_level(raw_vials: &[Vec<Item>], params: StaticParams) -> Result<Self, StateError> {
        let mut vials = build_vials(raw_vials, params.vial_height)?;
        for _ in 0..params.empty_vials {
            vials.push(Vial::new_empty());
        }
        Ok(Self { vials, params })
    }

    /// Parses a textual layout such as `"ABBA;BAAB;;"`: vials separated by
    /// `';'`, items as letters (`A` = 0) with the top item first, and an
    /// empty segment (or `"."`) for an empty vial. Every vial of the puzzle
    /// must be listed. The vial height defaults to the tallest vial;
    /// `num_colors` and `empty_vials` are inferred from the layout.
    pub fn from_repr(repr: &str, vial_height: Option<usize>) -> Result<Self, StateError> {
        let mut raw_vials: Vec<Vec<Item>> = Vec::new();
        for segment in repr.split(';') {
            let segment = segment.trim();
            if segment.is_empty() || segment == "." {
                raw_vials.push(Vec::new());
                continue;
            }
            let mut items = Vec::with_capacity(segment.len());
            for ch in segment.chars() {
                match letter_to_item(ch) {
                    Some(item) => items.push(item),
                    None => return Err(StateError::UnknownToken { token: ch }),
                }
            }
            raw_vials.push(items);
        }

        let tallest = raw_vials.iter().map(Vec::len).max().unwrap_or(0);
        let vial_height = vial_height.unwrap_or(tallest);
        let num_colors = raw_vials
            .iter()
            .flatten()
            .map(|&item| item + 1)
            .max()
            .unwrap_or(0);
        if num_colors > raw_vials.len() {
            return Err(StateError::MoreColorsThanVials {
                num_colors,
                vials: raw_vials.len(),
            });
        }
        let params = StaticParams {
            vial_height,
            num_colors,
            empty_vials: raw_vials.len() - num_colors,
        };
        Ok(Self {
            vials: build_vials(&raw_vials, vial_height)?,
            params,
        })
    }

    /// True when every vial is either empty or one full run of one color.
    pub fn is_won(&self) -> bool {
        self.vials
            .iter()
            .all(|vial| match vial.get_item_groups() {
                [] => true,
                [group] => group.count == self.params.vial_height,
                _ => false,
            })
    }

    /// Canonicalization: flatten every vial to its item sequence, sort the
    /// sequences by length then lexicographically, and join with delimiters
    /// so multi-digit items cannot collide.
    pub fn get_state_id(&self) -> StateId {
        let mut flattened: Vec<Vec<Item>> = self.vials.iter().map(Vial::flat_items).collect();
        flattened.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        let mut id = String::new();
        for (i, items) in flattened.iter().enumerate() {
            if i > 0 {
                id.push(';');
            }
            for (j, item) in items.iter().enumerate() {
                if j > 0 {
                    id.push(',');
                }
                id.push_str(&item.to_string());
            }
        }
        StateId(id)
    }

    /// Total items per color across all vials.
    pub fn get_color_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.params.num_colors];
        for vial in &self.vials {
            for group in vial.get_item_groups() {
                counts[group.item] += group.count;
            }
        }
        counts
    }
}

/// The id of the solved arrangement, built directly from the static
/// parameters without any search.
pub fn get_winning_state_id(params: StaticParams) -> StateId {
    let mut vials = Vec::with_capacity(params.num_colors + params.empty_vials);
    for color in 0..params.num_colors {
        vials.push(Vial {
            item_groups: vec![ItemGroup {
                item: color,
                count: params.vial_height,
            }],
            height: params.vial_height,
        });
    }
    for _ in 0..params.empty_vials {
        vials.push(Vial::new_empty());
    }
    GameState { vials, params }.get_state_id()
}

fn build_vials(raw_vials: &[Vec<Item>], vial_height: usize) -> Result<Vec<Vial>, StateError> {
    let mut vials = Vec::with_capacity(raw_vials.len());
    for (index, raw) in raw_vials.iter().enumerate() {
        if raw.len() > vial_height {
            return Err(StateError::VialTooTall {
                index,
                height: raw.len(),
                vial_height,
            });
        }
        vials.push(Vial::from_items(raw));
    }
    Ok(vials)
}

fn letter_to_item(ch: char) -> Option<Item> {
    if ch.is_ascii_alphabetic() {
        Some((ch.to_ascii_uppercase() as u8 - b'A') as Item)
    } else {
        None
    }
}

fn item_to_letter(item: Item) -> char {
    if item < 26 {
        (b'A' + item as u8) as char
    } else {
        '?'
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, vial) in self.vials.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            for item in vial.flat_items() {
                write!(f, "{}", item_to_letter(item))?;
            }
        }
        Ok(())
    }
}

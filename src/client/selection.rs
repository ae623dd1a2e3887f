use std::collections::BTreeMap;

use crate::models::{SeatRef, SelectedSeat};

/// Seats the session has been granted holds for and intends to buy.
///
/// Only `SeatHoldClient` mutates it, and only after the server answered.
#[derive(Debug, Default, Clone)]
pub struct Selection {
    seats: BTreeMap<SeatRef, SelectedSeat>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, seat: SelectedSeat) {
        self.seats.insert(seat.id(), seat);
    }

    pub(crate) fn remove(&mut self, seat: &SeatRef) -> Option<SelectedSeat> {
        self.seats.remove(seat)
    }

    pub(crate) fn clear(&mut self) {
        self.seats.clear();
    }

    pub fn contains(&self, seat: &SeatRef) -> bool {
        self.seats.contains_key(seat)
    }

    pub fn get(&self, seat: &SeatRef) -> Option<&SelectedSeat> {
        self.seats.get(seat)
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    pub fn seat_refs(&self) -> Vec<SeatRef> {
        self.seats.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectedSeat> {
        self.seats.values()
    }

    /// Sum of resolved prices; seats without a price count as zero.
    pub fn total_price_cents(&self) -> i64 {
        self.seats.values().filter_map(|seat| seat.price_cents).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SeatType;

    fn selected(table_id: i64, seat_number: i32, price_cents: Option<i64>) -> SelectedSeat {
        SelectedSeat { table_id, table_number: 1, seat_number, seat_type: SeatType::Standard, price_cents }
    }

    #[test]
    fn keyed_by_seat_reference() {
        let mut selection = Selection::new();
        selection.insert(selected(1, 2, Some(1000)));
        selection.insert(selected(1, 2, Some(1500)));
        selection.insert(selected(1, 1, None));

        assert_eq!(selection.len(), 2);
        assert_eq!(selection.seat_refs(), vec![SeatRef::new(1, 1), SeatRef::new(1, 2)]);
        assert_eq!(selection.total_price_cents(), 1500);

        assert!(selection.remove(&SeatRef::new(1, 2)).is_some());
        assert!(!selection.contains(&SeatRef::new(1, 2)));
        selection.clear();
        assert!(selection.is_empty());
    }
}

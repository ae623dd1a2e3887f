use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable seat identifier: table id plus seat number within that table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeatRef {
    pub table_id: i64,
    pub seat_number: i32,
}

impl SeatRef {
    pub fn new(table_id: i64, seat_number: i32) -> Self {
        Self { table_id, seat_number }
    }
}

// "12:3" is also the member format used for Redis sets
impl fmt::Display for SeatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_id, self.seat_number)
    }
}

impl FromStr for SeatRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (table, seat) = s
            .split_once(':')
            .ok_or_else(|| format!("malformed seat reference '{}'", s))?;
        let table_id = table
            .parse()
            .map_err(|_| format!("malformed table id in '{}'", s))?;
        let seat_number = seat
            .parse()
            .map_err(|_| format!("malformed seat number in '{}'", s))?;
        Ok(SeatRef { table_id, seat_number })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatType {
    Standard,
    Vip,
    Wheelchair,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Available,
    Held,
    Sold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableShape {
    Round,
    Rectangle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerType {
    Tables,
    GeneralAdmission,
}

macro_rules! string_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($ty), other)),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(SeatType { Standard => "STANDARD", Vip => "VIP", Wheelchair => "WHEELCHAIR" });
string_enum!(SeatStatus { Available => "AVAILABLE", Held => "HELD", Sold => "SOLD" });
string_enum!(TableShape { Round => "ROUND", Rectangle => "RECTANGLE" });
string_enum!(ContainerType { Tables => "TABLES", GeneralAdmission => "GENERAL_ADMISSION" });

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seat {
    pub table_id: i64,
    pub seat_number: i32,
    pub seat_type: SeatType,
    pub status: SeatStatus,
}

impl Seat {
    pub fn id(&self) -> SeatRef {
        SeatRef::new(self.table_id, self.seat_number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: i64,
    pub table_number: i32,
    pub shape: TableShape,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub capacity: u32,
    pub seats: Vec<Seat>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub container_type: ContainerType,
    /// Price is resolved through the tier, never stored on the section.
    pub tier_id: Option<i64>,
    pub tables: Vec<Table>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatingChart {
    pub id: i64,
    pub event_id: i64,
    pub name: String,
    pub sections: Vec<Section>,
}

impl SeatingChart {
    /// Finds a seat together with the table and section that own it.
    pub fn locate(&self, seat: SeatRef) -> Option<(&Section, &Table, &Seat)> {
        self.sections.iter().find_map(|section| {
            section
                .tables
                .iter()
                .find(|table| table.id == seat.table_id)
                .and_then(|table| {
                    table
                        .seats
                        .iter()
                        .find(|s| s.seat_number == seat.seat_number)
                        .map(|s| (section, table, s))
                })
        })
    }

    pub fn table(&self, table_id: i64) -> Option<&Table> {
        self.sections
            .iter()
            .flat_map(|section| section.tables.iter())
            .find(|table| table.id == table_id)
    }

    pub fn seats(&self) -> impl Iterator<Item = &Seat> {
        self.sections
            .iter()
            .flat_map(|section| section.tables.iter())
            .flat_map(|table| table.seats.iter())
    }

    pub fn seats_mut(&mut self) -> impl Iterator<Item = &mut Seat> {
        self.sections
            .iter_mut()
            .flat_map(|section| section.tables.iter_mut())
            .flat_map(|table| table.seats.iter_mut())
    }

    pub fn status_of(&self, seat: SeatRef) -> Option<SeatStatus> {
        self.locate(seat).map(|(_, _, s)| s.status)
    }

    /// Checks the structural invariants a chart must satisfy before it is served.
    pub fn check_layout(&self) -> Result<(), String> {
        let mut table_ids = std::collections::HashSet::new();
        for section in &self.sections {
            if section.container_type == ContainerType::GeneralAdmission && !section.tables.is_empty() {
                return Err(format!("general admission section '{}' cannot have tables", section.name));
            }
            for table in &section.tables {
                if !table_ids.insert(table.id) {
                    return Err(format!("table {} appears more than once", table.id));
                }
                if table.seats.len() != table.capacity as usize {
                    return Err(format!(
                        "table {} has {} seats but capacity {}",
                        table.id,
                        table.seats.len(),
                        table.capacity
                    ));
                }
                let mut numbers = std::collections::HashSet::new();
                for seat in &table.seats {
                    if seat.table_id != table.id {
                        return Err(format!("seat {} is attached to table {}", seat.id(), table.id));
                    }
                    if !numbers.insert(seat.seat_number) {
                        return Err(format!("seat {} appears more than once", seat.id()));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seat_ref_parses_its_own_display() {
        let seat = SeatRef::new(42, 7);
        assert_eq!(seat.to_string(), "42:7");
        assert_eq!("42:7".parse::<SeatRef>().unwrap(), seat);
        assert!("42".parse::<SeatRef>().is_err());
        assert!("a:1".parse::<SeatRef>().is_err());
    }

    #[test]
    fn enums_use_upper_snake_case_on_the_wire() {
        assert_eq!(serde_json::to_string(&SeatType::Wheelchair).unwrap(), "\"WHEELCHAIR\"");
        assert_eq!(serde_json::to_string(&ContainerType::GeneralAdmission).unwrap(), "\"GENERAL_ADMISSION\"");
        assert_eq!("VIP".parse::<SeatType>().unwrap(), SeatType::Vip);
        assert!("vip".parse::<SeatType>().is_err());
    }
}

//! # Register Planner
//!
//! Compiles template rows into a [`ReadPlan`]: for every function code, the
//! smallest set of contiguous read groups covering all templated addresses,
//! plus the per-address metadata the interpreter needs to decode responses.
//!
//! ```rust
//! use modbus_dl::planner::{ReadGroup, ReadPlan, TemplateRow};
//! use modbus_dl::ModbusFunction;
//!
//! let rows: Vec<TemplateRow> = [10, 11, 12, 15, 16]
//!     .into_iter()
//!     .map(|address| TemplateRow::new(address, "HR", "uint16", format!("tag_{}", address)))
//!     .collect();
//!
//! let plan = ReadPlan::compile(&rows);
//! assert_eq!(
//!     plan.groups(ModbusFunction::ReadHoldingRegisters),
//!     &[ReadGroup::new(10, 3), ReadGroup::new(15, 2)]
//! );
//! ```
//!
//! Template problems never fail compilation. Each dropped or patched row is
//! logged with `warn!` and recorded as a [`PlanWarning`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{debug, warn};

use crate::device_limits::DeviceLimits;
use crate::protocol::ModbusFunction;

/// Keywords recognised in a row's `read_type`, per function code.
///
/// Codes are tried in this order and aliases in table order.
pub static FUNCTION_CODE_ALIASES: &[(ModbusFunction, &[&str])] = &[
    (
        ModbusFunction::ReadCoils,
        &["1", "01", "FC01", "coil", "Coil", "coils", "Coils", "RC", "Coil-FC01"],
    ),
    (
        ModbusFunction::ReadDiscreteInputs,
        &["2", "02", "FC02", "discrete", "Discrete", "di", "DI", "RDI", "DI-FC02"],
    ),
    (
        ModbusFunction::ReadHoldingRegisters,
        &["3", "03", "FC03", "holding", "Holding", "HR", "RHR", "HR-FC03"],
    ),
    (
        ModbusFunction::ReadInputRegisters,
        &[
            "4",
            "04",
            "FC04",
            "input register",
            "input registers",
            "Input Register",
            "Input Registers",
            "IR",
            "RIR",
            "IR-FC04",
        ],
    ),
];

/// Supported data types, in the order they are listed to users.
pub static DATA_TYPES: &[DataType] = &[
    DataType::Uint16,
    DataType::Sint16,
    DataType::Ruint16,
    DataType::Rsint16,
    DataType::Float32,
    DataType::RFloat32ByteSwap,
    DataType::RFloat32WordSwap,
    DataType::RFloat32ByteWordSwap,
    DataType::Float64,
    DataType::PackedBool,
    DataType::Di,
    DataType::Coil,
];

/// Data type assumed when a row leaves `data_type` blank.
pub const DEFAULT_DATA_TYPE: DataType = DataType::Sint16;

/// How the words at one address are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Uint16,
    Sint16,
    /// uint16 with its two bytes swapped
    Ruint16,
    /// sint16 with its two bytes swapped
    Rsint16,
    Float32,
    RFloat32ByteSwap,
    RFloat32WordSwap,
    RFloat32ByteWordSwap,
    Float64,
    /// Sixteen independent flags in one register
    PackedBool,
    Di,
    Coil,
}

impl DataType {
    pub fn name(self) -> &'static str {
        match self {
            DataType::Uint16 => "uint16",
            DataType::Sint16 => "sint16",
            DataType::Ruint16 => "ruint16",
            DataType::Rsint16 => "rsint16",
            DataType::Float32 => "float32",
            DataType::RFloat32ByteSwap => "rfloat32_byte_swap",
            DataType::RFloat32WordSwap => "rfloat32_word_swap",
            DataType::RFloat32ByteWordSwap => "rfloat32_byte_word_swap",
            DataType::Float64 => "float64",
            DataType::PackedBool => "packedbool",
            DataType::Di => "di",
            DataType::Coil => "coil",
        }
    }

    /// Number of consecutive addresses one value occupies.
    pub fn register_count(self) -> u16 {
        match self {
            DataType::Float32
            | DataType::RFloat32ByteSwap
            | DataType::RFloat32WordSwap
            | DataType::RFloat32ByteWordSwap => 2,
            DataType::Float64 => 4,
            _ => 1,
        }
    }

    /// Exact, case-sensitive lookup after trimming whitespace.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        DATA_TYPES.iter().copied().find(|dt| dt.name() == name)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolve a free-form `read_type` to a function code.
///
/// The longest alias contained in `read_type` wins, so `Holding Registers`
/// resolves through `Holding` rather than the `di` inside it. Equal lengths
/// fall back to code order, then table order.
pub fn resolve_function(read_type: &str) -> Option<ModbusFunction> {
    let read_type = read_type.trim();
    let mut best: Option<(ModbusFunction, usize)> = None;
    for (function, aliases) in FUNCTION_CODE_ALIASES {
        for alias in aliases.iter().filter(|alias| read_type.contains(*alias)) {
            if best.map_or(true, |(_, len)| alias.len() > len) {
                best = Some((*function, alias.len()));
            }
        }
    }
    best.map(|(function, _)| function)
}

/// One row of the register template, as authored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateRow {
    pub address: Option<u32>,
    pub read_type: Option<String>,
    pub data_type: Option<String>,
    pub tag_name: Option<String>,
    pub scaling_coeff: Option<f64>,
    pub scaling_offset: Option<f64>,
}

impl TemplateRow {
    pub fn new(
        address: u32,
        read_type: impl Into<String>,
        data_type: impl Into<String>,
        tag_name: impl Into<String>,
    ) -> Self {
        Self {
            address: Some(address),
            read_type: Some(read_type.into()),
            data_type: Some(data_type.into()),
            tag_name: Some(tag_name.into()),
            scaling_coeff: None,
            scaling_offset: None,
        }
    }

    pub fn with_scaling(mut self, coeff: Option<f64>, offset: Option<f64>) -> Self {
        self.scaling_coeff = coeff;
        self.scaling_offset = offset;
        self
    }
}

/// Affine scaling `value * coeff + offset`; NaN counts as absent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Scaling {
    pub coeff: Option<f64>,
    pub offset: Option<f64>,
}

impl Scaling {
    pub fn new(coeff: Option<f64>, offset: Option<f64>) -> Self {
        Self {
            coeff: coeff.filter(|c| !c.is_nan()),
            offset: offset.filter(|o| !o.is_nan()),
        }
    }

    /// `None` when no scaling is configured, so the caller keeps the raw type.
    pub fn apply(&self, value: f64) -> Option<f64> {
        match (self.coeff, self.offset) {
            (None, None) => None,
            (Some(coeff), None) => Some(value * coeff),
            (None, Some(offset)) => Some(value + offset),
            (Some(coeff), Some(offset)) => Some(value * coeff + offset),
        }
    }
}

/// Decoding instructions for the value starting at one address.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressMetadata {
    pub register_count: u16,
    pub data_type: DataType,
    pub tag_name: String,
    pub scaling: Scaling,
}

/// Metadata of one function code, keyed by start address.
pub type AddressTable = BTreeMap<u16, AddressMetadata>;

/// One contiguous span fetched by a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadGroup {
    pub start_address: u16,
    pub register_count: u16,
}

impl ReadGroup {
    pub const fn new(start_address: u16, register_count: u16) -> Self {
        Self {
            start_address,
            register_count,
        }
    }

    /// One past the last address, widened so 65535 fits.
    pub fn end_address(&self) -> u32 {
        u32::from(self.start_address) + u32::from(self.register_count)
    }
}

/// Template diagnostic. Rows are numbered from 1 in template order.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanWarning {
    MissingAddress { row: usize },
    AddressOutOfRange { row: usize, address: u32 },
    MissingReadType { row: usize, address: u32 },
    UnknownReadType { row: usize, read_type: String },
    DefaultDataType { row: usize, address: u32 },
    UnsupportedDataType { row: usize, data_type: String },
    DefaultTagName { row: usize, tag_name: String },
}

impl PlanWarning {
    /// True when the row was dropped rather than patched.
    pub fn drops_row(&self) -> bool {
        !matches!(
            self,
            PlanWarning::DefaultDataType { .. } | PlanWarning::DefaultTagName { .. }
        )
    }
}

impl fmt::Display for PlanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanWarning::MissingAddress { row } => {
                write!(f, "row {}: no address, row skipped", row)
            }
            PlanWarning::AddressOutOfRange { row, address } => {
                write!(f, "row {}: address {} out of range, row skipped", row, address)
            }
            PlanWarning::MissingReadType { row, address } => {
                write!(f, "row {}: no read_type for address {}, row skipped", row, address)
            }
            PlanWarning::UnknownReadType { row, read_type } => {
                write!(f, "row {}: unrecognised read_type {:?}, row skipped", row, read_type)
            }
            PlanWarning::DefaultDataType { row, address } => write!(
                f,
                "row {}: no data_type for address {}, assuming {} (logged data may be inaccurate)",
                row, address, DEFAULT_DATA_TYPE
            ),
            PlanWarning::UnsupportedDataType { row, data_type } => {
                let supported: Vec<&str> = DATA_TYPES.iter().map(|dt| dt.name()).collect();
                write!(
                    f,
                    "row {}: unsupported data_type {:?}, row skipped (supported: {})",
                    row,
                    data_type,
                    supported.join(", ")
                )
            }
            PlanWarning::DefaultTagName { row, tag_name } => {
                write!(f, "row {}: no tag_name, using {:?}", row, tag_name)
            }
        }
    }
}

/// Compiled read plan, immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadPlan {
    groups: BTreeMap<ModbusFunction, Vec<ReadGroup>>,
    tables: BTreeMap<ModbusFunction, AddressTable>,
    warnings: Vec<PlanWarning>,
}

fn blank_to_none(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl ReadPlan {
    /// Compile with the protocol's default per-request limits.
    pub fn compile(rows: &[TemplateRow]) -> Self {
        Self::compile_with_limits(rows, &DeviceLimits::default())
    }

    pub fn compile_with_limits(rows: &[TemplateRow], limits: &DeviceLimits) -> Self {
        let mut plan = ReadPlan::default();
        let mut consumed: BTreeMap<ModbusFunction, BTreeSet<u16>> = BTreeMap::new();

        for (index, row) in rows.iter().enumerate() {
            let row_number = index + 1;
            let Some((function, start, metadata)) = plan.resolve_row(row_number, row) else {
                continue;
            };

            let addresses = consumed.entry(function).or_default();
            addresses.extend((0..metadata.register_count).map(|offset| start + offset));

            let table = plan.tables.entry(function).or_default();
            if let Some(previous) = table.insert(start, metadata) {
                debug!(
                    "row {}: {} address {} overrides tag {:?}",
                    row_number,
                    function.label(),
                    start,
                    previous.tag_name
                );
            }
        }

        let empty = AddressTable::new();
        for (function, addresses) in &consumed {
            let table = plan.tables.get(function).unwrap_or(&empty);
            let max = limits.max_quantity(*function);
            let groups: Vec<ReadGroup> = merge_contiguous(addresses)
                .into_iter()
                .flat_map(|run| split_at_value_starts(run, table, max))
                .collect();
            debug!(
                "{}: {} addresses in {} read groups",
                function.label(),
                addresses.len(),
                groups.len()
            );
            plan.groups.insert(*function, groups);
        }

        plan
    }

    fn warn(&mut self, warning: PlanWarning) {
        warn!("Template {}", warning);
        self.warnings.push(warning);
    }

    fn resolve_row(
        &mut self,
        row_number: usize,
        row: &TemplateRow,
    ) -> Option<(ModbusFunction, u16, AddressMetadata)> {
        let Some(address) = row.address else {
            self.warn(PlanWarning::MissingAddress { row: row_number });
            return None;
        };

        let Some(read_type) = blank_to_none(row.read_type.as_ref()) else {
            self.warn(PlanWarning::MissingReadType {
                row: row_number,
                address,
            });
            return None;
        };

        let data_type = match blank_to_none(row.data_type.as_ref()) {
            None => {
                self.warn(PlanWarning::DefaultDataType {
                    row: row_number,
                    address,
                });
                DEFAULT_DATA_TYPE
            }
            Some(name) => match DataType::from_name(name) {
                Some(data_type) => data_type,
                None => {
                    self.warn(PlanWarning::UnsupportedDataType {
                        row: row_number,
                        data_type: name.to_string(),
                    });
                    return None;
                }
            },
        };

        let register_count = data_type.register_count();
        let start = match u16::try_from(address) {
            Ok(start) if u32::from(start) + u32::from(register_count) <= 0x1_0000 => start,
            _ => {
                self.warn(PlanWarning::AddressOutOfRange {
                    row: row_number,
                    address,
                });
                return None;
            }
        };

        let Some(function) = resolve_function(read_type) else {
            self.warn(PlanWarning::UnknownReadType {
                row: row_number,
                read_type: read_type.to_string(),
            });
            return None;
        };

        let tag_name = match blank_to_none(row.tag_name.as_ref()) {
            Some(tag) => tag.to_string(),
            None => {
                let tag_name = format!(
                    "{}_address_{}_data_type_{}",
                    read_type, address, data_type
                );
                self.warn(PlanWarning::DefaultTagName {
                    row: row_number,
                    tag_name: tag_name.clone(),
                });
                tag_name
            }
        };

        Some((
            function,
            start,
            AddressMetadata {
                register_count,
                data_type,
                tag_name,
                scaling: Scaling::new(row.scaling_coeff, row.scaling_offset),
            },
        ))
    }

    /// Read groups of `function`, ascending by start address.
    pub fn groups(&self, function: ModbusFunction) -> &[ReadGroup] {
        self.groups.get(&function).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every read group in poll order: function codes in declaration order.
    pub fn iter_groups(&self) -> impl Iterator<Item = (ModbusFunction, ReadGroup)> + '_ {
        ModbusFunction::ALL
            .into_iter()
            .flat_map(move |function| self.groups(function).iter().map(move |g| (function, *g)))
    }

    pub fn address_table(&self, function: ModbusFunction) -> Option<&AddressTable> {
        self.tables.get(&function)
    }

    pub fn metadata(&self, function: ModbusFunction, address: u16) -> Option<&AddressMetadata> {
        self.tables.get(&function)?.get(&address)
    }

    pub fn warnings(&self) -> &[PlanWarning] {
        &self.warnings
    }

    /// Number of requests issued per poll tick.
    pub fn request_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.request_count() == 0
    }
}

/// Merge sorted addresses into runs of consecutive addresses.
fn merge_contiguous(addresses: &BTreeSet<u16>) -> Vec<ReadGroup> {
    let mut runs: Vec<ReadGroup> = Vec::new();
    for &address in addresses {
        match runs.last_mut() {
            Some(run) if run.end_address() == u32::from(address) => run.register_count += 1,
            _ => runs.push(ReadGroup::new(address, 1)),
        }
    }
    runs
}

/// Cut a run into requests of at most `max`, only where a value starts and
/// no earlier value is still open.
///
/// A value wider than `max` still gets a request of its own.
fn split_at_value_starts(run: ReadGroup, table: &AddressTable, max: u16) -> Vec<ReadGroup> {
    let end = run.end_address();
    let max = u32::from(max);
    let widest = DATA_TYPES
        .iter()
        .map(|data_type| u32::from(data_type.register_count()))
        .max()
        .unwrap_or(1);
    let mut chunks = Vec::new();
    let mut start = u32::from(run.start_address);

    while end - start > max {
        let limit = start + max;
        // cut < end <= 0x1_0000, so it fits in u16
        let is_value_start = |address: &u32| {
            let cut = *address;
            table.contains_key(&(cut as u16))
                && !table
                    .range(..cut as u16)
                    .rev()
                    .take_while(|(first, _)| u32::from(**first) + widest > cut)
                    .any(|(first, meta)| u32::from(*first) + u32::from(meta.register_count) > cut)
        };
        let cut = (start + 1..=limit)
            .rev()
            .find(is_value_start)
            .or_else(|| (limit + 1..end).find(is_value_start))
            .unwrap_or(end);
        chunks.push(ReadGroup::new(start as u16, (cut - start) as u16));
        start = cut;
    }
    if start < end {
        chunks.push(ReadGroup::new(start as u16, (end - start) as u16));
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hr(address: u32, data_type: &str, tag: &str) -> TemplateRow {
        TemplateRow::new(address, "HR", data_type, tag)
    }

    #[test]
    fn test_interval_merge() {
        let rows: Vec<_> = [10, 11, 12, 15, 16]
            .into_iter()
            .map(|a| hr(a, "uint16", &format!("t{}", a)))
            .collect();
        let plan = ReadPlan::compile(&rows);
        assert_eq!(
            plan.groups(ModbusFunction::ReadHoldingRegisters),
            &[ReadGroup::new(10, 3), ReadGroup::new(15, 2)]
        );
        assert!(plan.warnings().is_empty());
        assert_eq!(plan.request_count(), 2);
    }

    #[test]
    fn test_register_counts() {
        for name in ["uint16", "sint16", "ruint16", "rsint16", "di", "coil", "packedbool"] {
            assert_eq!(DataType::from_name(name).unwrap().register_count(), 1);
        }
        for name in [
            "float32",
            "rfloat32_byte_swap",
            "rfloat32_word_swap",
            "rfloat32_byte_word_swap",
        ] {
            assert_eq!(DataType::from_name(name).unwrap().register_count(), 2);
        }
        assert_eq!(DataType::from_name(" float64 ").unwrap().register_count(), 4);
        assert_eq!(DataType::from_name("Float32"), None);
    }

    #[test]
    fn test_multi_register_values_merge() {
        let rows = vec![
            hr(100, "float32", "a"),
            hr(102, "float64", "b"),
            hr(106, "uint16", "c"),
        ];
        let plan = ReadPlan::compile(&rows);
        assert_eq!(
            plan.groups(ModbusFunction::ReadHoldingRegisters),
            &[ReadGroup::new(100, 7)]
        );
        let meta = plan
            .metadata(ModbusFunction::ReadHoldingRegisters, 102)
            .unwrap();
        assert_eq!(meta.register_count, 4);
        assert_eq!(meta.tag_name, "b");
    }

    #[test]
    fn test_read_type_resolution() {
        assert_eq!(resolve_function("Coil-FC01"), Some(ModbusFunction::ReadCoils));
        assert_eq!(
            resolve_function("RDI"),
            Some(ModbusFunction::ReadDiscreteInputs)
        );
        assert_eq!(
            resolve_function("Holding"),
            Some(ModbusFunction::ReadHoldingRegisters)
        );
        assert_eq!(
            resolve_function("HR-FC03"),
            Some(ModbusFunction::ReadHoldingRegisters)
        );
        assert_eq!(
            resolve_function("Input Registers"),
            Some(ModbusFunction::ReadInputRegisters)
        );
        // Substring match
        assert_eq!(
            resolve_function("my IR block"),
            Some(ModbusFunction::ReadInputRegisters)
        );
        assert_eq!(resolve_function("FC02"), Some(ModbusFunction::ReadDiscreteInputs));
        assert_eq!(resolve_function("3"), Some(ModbusFunction::ReadHoldingRegisters));
    }

    #[test]
    fn test_multi_word_read_types() {
        // "di" inside "Holding" must not select discrete inputs
        for read_type in [
            "Holding Registers",
            "holding register",
            "Holding-FC03",
            " Holding ",
        ] {
            assert_eq!(
                resolve_function(read_type),
                Some(ModbusFunction::ReadHoldingRegisters),
                "{read_type}"
            );
        }
        assert_eq!(
            resolve_function("Discrete Inputs"),
            Some(ModbusFunction::ReadDiscreteInputs)
        );
        assert_eq!(
            resolve_function("Coils block 2"),
            Some(ModbusFunction::ReadCoils)
        );
        assert_eq!(
            resolve_function("Input Register 7"),
            Some(ModbusFunction::ReadInputRegisters)
        );
        assert_eq!(resolve_function("analog"), None);
    }

    #[test]
    fn test_rows_dropped_with_warnings() {
        let rows = vec![
            TemplateRow {
                read_type: Some("HR".into()),
                ..Default::default()
            },
            TemplateRow {
                address: Some(5),
                read_type: Some("  ".into()),
                ..Default::default()
            },
            TemplateRow::new(6, "bogus", "uint16", "x"),
            TemplateRow::new(7, "HR", "int32", "y"),
            TemplateRow::new(70_000, "HR", "uint16", "z"),
            TemplateRow::new(65_535, "HR", "float32", "w"),
        ];
        let plan = ReadPlan::compile(&rows);
        assert!(plan.is_empty());
        assert_eq!(plan.warnings().len(), 6);
        assert!(plan.warnings().iter().all(PlanWarning::drops_row));
        assert!(matches!(
            plan.warnings()[3],
            PlanWarning::UnsupportedDataType { row: 4, .. }
        ));
    }

    #[test]
    fn test_defaults_for_data_type_and_tag() {
        let rows = vec![TemplateRow {
            address: Some(40),
            read_type: Some("FC04".into()),
            ..Default::default()
        }];
        let plan = ReadPlan::compile(&rows);
        let meta = plan
            .metadata(ModbusFunction::ReadInputRegisters, 40)
            .unwrap();
        assert_eq!(meta.data_type, DataType::Sint16);
        assert_eq!(meta.tag_name, "FC04_address_40_data_type_sint16");
        assert_eq!(plan.warnings().len(), 2);
        assert!(!plan.warnings()[0].drops_row());
    }

    #[test]
    fn test_later_row_overwrites_metadata() {
        let rows = vec![hr(1, "uint16", "first"), hr(1, "sint16", "second")];
        let plan = ReadPlan::compile(&rows);
        let table = plan
            .address_table(ModbusFunction::ReadHoldingRegisters)
            .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table[&1].tag_name, "second");
        assert_eq!(
            plan.groups(ModbusFunction::ReadHoldingRegisters),
            &[ReadGroup::new(1, 1)]
        );
    }

    #[test]
    fn test_scaling_nan_is_absent() {
        let scaling = Scaling::new(Some(f64::NAN), Some(5.0));
        assert_eq!(scaling.coeff, None);
        assert_eq!(scaling.apply(10.0), Some(15.0));
        assert_eq!(Scaling::new(Some(2.0), None).apply(10.0), Some(20.0));
        assert_eq!(Scaling::new(Some(2.0), Some(5.0)).apply(10.0), Some(25.0));
        assert_eq!(Scaling::default().apply(10.0), None);
    }

    #[test]
    fn test_split_respects_limits_and_values() {
        // 64 float32 values = 128 contiguous registers
        let rows: Vec<_> = (0..64)
            .map(|i| hr(i * 2, "float32", &format!("f{}", i)))
            .collect();
        let plan = ReadPlan::compile(&rows);
        assert_eq!(
            plan.groups(ModbusFunction::ReadHoldingRegisters),
            &[ReadGroup::new(0, 124), ReadGroup::new(124, 4)]
        );

        let limits = DeviceLimits::new().with_max_read_registers(3);
        let plan = ReadPlan::compile_with_limits(&rows[..2], &limits);
        assert_eq!(
            plan.groups(ModbusFunction::ReadHoldingRegisters),
            &[ReadGroup::new(0, 2), ReadGroup::new(2, 2)]
        );
    }

    #[test]
    fn test_split_never_inside_overlapping_value() {
        let limits = DeviceLimits::new().with_max_read_registers(3);

        // uint16@2 sits inside float64@0, so 2 is not a valid cut
        let rows = vec![hr(0, "float64", "big"), hr(2, "uint16", "small")];
        let plan = ReadPlan::compile_with_limits(&rows, &limits);
        assert_eq!(
            plan.groups(ModbusFunction::ReadHoldingRegisters),
            &[ReadGroup::new(0, 4)]
        );

        // the next clean boundary is used instead
        let rows = vec![
            hr(0, "float64", "big"),
            hr(2, "uint16", "small"),
            hr(4, "uint16", "after"),
        ];
        let plan = ReadPlan::compile_with_limits(&rows, &limits);
        assert_eq!(
            plan.groups(ModbusFunction::ReadHoldingRegisters),
            &[ReadGroup::new(0, 4), ReadGroup::new(4, 1)]
        );

        let raw = crate::protocol::RawValues::Words(vec![0x4000, 0, 0, 0]);
        let table = plan
            .address_table(ModbusFunction::ReadHoldingRegisters)
            .unwrap();
        let tags = crate::codec::interpret(&raw, ModbusFunction::ReadHoldingRegisters, 0, table);
        assert_eq!(tags.get("big"), Some(&crate::value::TagValue::F64(2.0)));
    }

    #[test]
    fn test_bit_groups() {
        let rows: Vec<_> = (0..2500)
            .map(|a| TemplateRow::new(a, "coil", "coil", format!("c{}", a)))
            .collect();
        let plan = ReadPlan::compile(&rows);
        assert_eq!(
            plan.groups(ModbusFunction::ReadCoils),
            &[ReadGroup::new(0, 2000), ReadGroup::new(2000, 500)]
        );
        let order: Vec<_> = plan.iter_groups().map(|(f, _)| f).collect();
        assert_eq!(order, vec![ModbusFunction::ReadCoils; 2]);
    }

    proptest! {
        #[test]
        fn prop_groups_cover_exactly_the_templated_addresses(
            addresses in prop::collection::btree_set(0u16..600, 0..200)
        ) {
            let rows: Vec<_> = addresses
                .iter()
                .map(|&a| hr(u32::from(a), "uint16", &format!("t{}", a)))
                .collect();
            let plan = ReadPlan::compile(&rows);
            let groups = plan.groups(ModbusFunction::ReadHoldingRegisters);

            let covered: Vec<u16> = groups
                .iter()
                .flat_map(|g| g.start_address..g.start_address + g.register_count)
                .collect();
            prop_assert_eq!(covered, addresses.iter().copied().collect::<Vec<_>>());

            for pair in groups.windows(2) {
                // Adjacent groups are separated by a gap unless a cap split them
                let gap = u32::from(pair[1].start_address) > pair[0].end_address();
                prop_assert!(gap || pair[0].register_count == 125);
            }
            prop_assert!(groups.iter().all(|g| g.register_count >= 1 && g.register_count <= 125));
        }
    }
}

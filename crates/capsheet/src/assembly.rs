//! Sheet assembly: the single pass that compiles a document
//!
//! Assembly walks rounds in document order, threading one append-only
//! [`LayoutRegistry`] forward. For each round it first registers every
//! location the round defines (constant block, table columns, instrument
//! rows), then resolves the round's formulas, then seals the round. Because
//! round *N* formulas reference round *N-1* aggregates, that order is a
//! correctness requirement, and the registry reports out-of-order references
//! as a distinct error class.
//!
//! Layout is deterministic: one sheet per round with a constant block in
//! column B (one row per [`AggregateKind`], each also published as a
//! workbook-global defined name) and an instrument table below it, plus a
//! holdings sheet with one row per holder and one column per round.

use capsheet_core::{
    aggregate_name, sanitize_name, AggregateKind, CalculationType, CellAddress, CellRange,
    DefinedName, Document, Error as CoreError, Instrument, InstrumentKind,
    LayoutRegistry, Location, ProRataType, Round, SymbolKey,
};
use capsheet_formula::allocation::{
    anti_dilution::{additional_shares_formula, AntiDilutionRefs},
    pro_rata::{
        new_total_formula, rights_sum_formula, standard_allocation_formula,
        super_allocation_formula, AggregateRefs,
    },
    OVERSUBSCRIPTION_CAP,
};
use capsheet_formula::encoding::ensure_division_guard;
use capsheet_formula::expr::{min, paren, round as round_expr, sum, sumif, sumifs, text_literal};
use capsheet_formula::{
    resolve_encoding, FormulaEncoding, FormulaError, ReferenceKind, ResolveContext, Resolver,
};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::output::{CellContent, CompiledModel, CompiledSheet, TableDef};

/// Errors produced during assembly
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// A formula could not be compiled
    #[error(transparent)]
    Formula(#[from] FormulaError),

    /// A registry or addressing operation failed
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An anti-dilution instrument in the first round has no round to fall
    /// back to
    #[error("No original round for anti-dilution instrument in round '{round}' (holder '{holder}')")]
    MissingOriginalRound { round: String, holder: String },
}

/// Result type for assembly
pub type AssemblyResult<T> = std::result::Result<T, AssemblyError>;

/// Options controlling assembly output
#[derive(Debug, Clone)]
pub struct AssemblyOptions {
    /// Emit `Table[Column]` structured references; when false every table
    /// reference falls back to raw absolute ranges
    pub structured_refs: bool,
    /// Name of the holdings summary sheet
    pub holdings_sheet: String,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            structured_refs: true,
            holdings_sheet: "Holdings".to_string(),
        }
    }
}

// Fixed sheet geometry. The constant block sits in column B with its labels
// in column A; the instrument table starts below it.
const LABEL_COL: u16 = 0;
const AGGREGATE_COL: u16 = 1;
const TABLE_HEADER_ROW: u32 = 15;
const TABLE_FIRST_DATA_ROW: u32 = 16;

const TABLE_COLUMNS: [&str; 8] = [
    "Holder",
    "Class",
    "Kind",
    "Rights",
    "Amount",
    "Target",
    "HeldBefore",
    "Shares",
];

const COL_HOLDER: u16 = 0;
const COL_CLASS: u16 = 1;
const COL_KIND: u16 = 2;
const COL_RIGHTS: u16 = 3;
const COL_AMOUNT: u16 = 4;
const COL_TARGET: u16 = 5;
const COL_HELD: u16 = 6;
const COL_SHARES: u16 = 7;

// Holdings sheet geometry: holder names in column A, one column per round.
const HOLDINGS_FIRST_ROW: u32 = 1;
const HOLDINGS_FIRST_COL: u16 = 1;

/// Row of an aggregate's cell within the constant block
fn aggregate_row(kind: AggregateKind) -> u32 {
    let idx = AggregateKind::ALL
        .iter()
        .position(|k| *k == kind)
        .expect("kind is in ALL");
    1 + idx as u32
}

/// Compile a validated document into a workbook description.
///
/// This is the only entry point; it owns the registry for the whole pass.
pub fn compile(doc: &Document, options: &AssemblyOptions) -> AssemblyResult<CompiledModel> {
    Assembler::new(doc, options).run()
}

struct Assembler<'a> {
    doc: &'a Document,
    options: &'a AssemblyOptions,
    registry: LayoutRegistry,
    holdings_sheet: String,
}

impl<'a> Assembler<'a> {
    fn new(doc: &'a Document, options: &'a AssemblyOptions) -> Self {
        Self {
            doc,
            options,
            registry: LayoutRegistry::new(),
            holdings_sheet: sanitize_name(&options.holdings_sheet),
        }
    }

    fn run(mut self) -> AssemblyResult<CompiledModel> {
        let mut model = CompiledModel {
            company: self.doc.company.clone(),
            ..Default::default()
        };

        self.registry
            .declare_rounds(self.doc.rounds.iter().map(|r| r.name.as_str()));

        // Holdings rows are addressable from every round, so they register
        // before the round pass begins.
        for (i, holder) in self.doc.holders.iter().enumerate() {
            self.registry.register(
                SymbolKey::holding(&holder.name),
                Location::cell(
                    self.holdings_sheet.clone(),
                    CellAddress::absolute(HOLDINGS_FIRST_ROW + i as u32, 0),
                ),
            )?;
        }

        for (index, round) in self.doc.rounds.iter().enumerate() {
            let sheet = self.assemble_round(index, round, &mut model)?;
            model.sheets.push(sheet);
            self.registry.seal_round(&round.name);
            log::debug!("assembled round '{}' ({} cells)", round.name, model.sheets.last().map_or(0, |s| s.cells.len()));
        }

        model.sheets.push(self.assemble_holdings()?);

        Ok(model)
    }

    // === Round sheets ===

    fn assemble_round(
        &mut self,
        index: usize,
        round: &Round,
        model: &mut CompiledModel,
    ) -> AssemblyResult<CompiledSheet> {
        let sheet_name = sanitize_name(&round.name);
        let table_name = format!("{}_Instruments", sheet_name);
        let mut sheet = CompiledSheet::new(&sheet_name);

        self.register_round_layout(round, &sheet_name, &table_name, model)?;

        sheet.set(
            CellAddress::new(0, 0),
            CellContent::Text(format!("{} ({})", round.name, round.date)),
        );

        // Constant block: label in A, formula/value in B, plus the defined
        // name downstream rounds resolve.
        for kind in AggregateKind::ALL {
            let addr = CellAddress::absolute(aggregate_row(kind), AGGREGATE_COL);
            sheet.set(
                CellAddress::new(aggregate_row(kind), LABEL_COL),
                CellContent::Text(kind.suffix().to_string()),
            );
            sheet.set(addr, self.aggregate_content(index, round, kind)?);
            model.defined_names.push(DefinedName::new(
                aggregate_name(&round.name, kind),
                format!("{}!{}", sheet_name, addr),
            ));
        }

        // Instrument table
        for (ci, column) in TABLE_COLUMNS.iter().enumerate() {
            sheet.set(
                CellAddress::new(TABLE_HEADER_ROW, ci as u16),
                CellContent::Text(column.to_string()),
            );
        }
        for (ri, instrument) in round.instruments.iter().enumerate() {
            let row = TABLE_FIRST_DATA_ROW + ri as u32;
            self.emit_instrument_row(index, round, instrument, row, &mut sheet)?;
        }

        Ok(sheet)
    }

    /// Register every location a round defines, before any of its formulas
    /// resolve. Registration must complete first so that within-round
    /// references (aggregates reading table columns, instruments reading
    /// aggregates) always hit the registry.
    fn register_round_layout(
        &mut self,
        round: &Round,
        sheet_name: &str,
        table_name: &str,
        model: &mut CompiledModel,
    ) -> AssemblyResult<()> {
        self.registry.register(
            SymbolKey::round(&round.name),
            Location::cell(sheet_name, CellAddress::absolute(0, 0)),
        )?;

        for kind in AggregateKind::ALL {
            self.registry.register(
                SymbolKey::aggregate(&round.name, kind),
                Location::cell(
                    sheet_name,
                    CellAddress::absolute(aggregate_row(kind), AGGREGATE_COL),
                ),
            )?;
        }

        let data_rows = round.instruments.len().max(1) as u32;
        let data_end_row = TABLE_FIRST_DATA_ROW + data_rows - 1;
        for (ci, column) in TABLE_COLUMNS.iter().enumerate() {
            let range = CellRange::absolute(TABLE_FIRST_DATA_ROW, ci as u16, data_end_row, ci as u16);
            let location = if self.options.structured_refs {
                Location::table_column(sheet_name, table_name, *column, range)
            } else {
                Location::column_range(sheet_name, *column, range)
            };
            self.registry
                .register(SymbolKey::column(&round.name, *column), location)?;
        }

        if self.options.structured_refs {
            model.tables.push(TableDef {
                name: table_name.to_string(),
                sheet: sheet_name.to_string(),
                range: CellRange::absolute(TABLE_HEADER_ROW, 0, data_end_row, 7),
                columns: TABLE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            });
        }

        for (ri, instrument) in round.instruments.iter().enumerate() {
            self.registry.register(
                SymbolKey::instrument(&instrument.id),
                Location::cell(
                    sheet_name,
                    CellAddress::absolute(TABLE_FIRST_DATA_ROW + ri as u32, COL_SHARES),
                ),
            )?;
        }

        Ok(())
    }

    /// The formula or value for one aggregate cell
    fn aggregate_content(
        &self,
        index: usize,
        round: &Round,
        kind: AggregateKind,
    ) -> AssemblyResult<CellContent> {
        let ctx = ResolveContext::round(&round.name);

        let content = match kind {
            AggregateKind::PreRoundShares => match index {
                // The base of the recurrence: nothing outstanding before the
                // first round
                0 => CellContent::Number(Decimal::ZERO),
                _ => {
                    let prev = &self.doc.rounds[index - 1].name;
                    let encoding = FormulaEncoding::new("{prev_pre}+{prev_issued}")
                        .dep(
                            "{prev_pre}",
                            SymbolKey::aggregate(prev, AggregateKind::PreRoundShares),
                            ReferenceKind::Named,
                        )
                        .dep(
                            "{prev_issued}",
                            SymbolKey::aggregate(prev, AggregateKind::IssuedShares),
                            ReferenceKind::Named,
                        );
                    CellContent::Formula(resolve_encoding(&encoding, &self.registry, &ctx)?)
                }
            },

            AggregateKind::PreMoneyValuation => {
                CellContent::Number(round.pre_money_valuation.unwrap_or(Decimal::ZERO))
            }

            AggregateKind::PricePerShare => self.price_content(index, round, &ctx)?,

            AggregateKind::NewMoney => {
                let amount = self.column_ref(round, "Amount")?;
                CellContent::Formula(format!("={}", sum(&amount)))
            }

            AggregateKind::BaseShares => CellContent::Formula(format!(
                "={}",
                sumif(
                    &self.column_ref(round, "Kind")?,
                    &text_literal("primary"),
                    &self.column_ref(round, "Shares")?,
                )
            )),

            AggregateKind::ProRataTargetSum => CellContent::Formula(rights_sum_formula(
                &self.column_ref(round, "Rights")?,
                "standard",
                &self.column_ref(round, "Target")?,
            )),
            AggregateKind::SuperTargetSum => CellContent::Formula(rights_sum_formula(
                &self.column_ref(round, "Rights")?,
                "super",
                &self.column_ref(round, "Target")?,
            )),
            AggregateKind::ProRataHeldSum => CellContent::Formula(rights_sum_formula(
                &self.column_ref(round, "Rights")?,
                "standard",
                &self.column_ref(round, "HeldBefore")?,
            )),
            AggregateKind::SuperHeldSum => CellContent::Formula(rights_sum_formula(
                &self.column_ref(round, "Rights")?,
                "super",
                &self.column_ref(round, "HeldBefore")?,
            )),

            AggregateKind::NewTotalShares => {
                CellContent::Formula(new_total_formula(&self.aggregate_refs(round)?))
            }

            AggregateKind::ProRataShares => CellContent::Formula(format!(
                "={}",
                sumif(
                    &self.column_ref(round, "Kind")?,
                    &text_literal("pro_rata"),
                    &self.column_ref(round, "Shares")?,
                )
            )),
            AggregateKind::AntiDilutionShares => CellContent::Formula(format!(
                "={}",
                sumif(
                    &self.column_ref(round, "Kind")?,
                    &text_literal("anti_dilution"),
                    &self.column_ref(round, "Shares")?,
                )
            )),

            AggregateKind::IssuedShares => {
                let encoding = FormulaEncoding::new("{base}+{pro_rata}+{anti_dilution}")
                    .dep(
                        "{base}",
                        SymbolKey::aggregate(&round.name, AggregateKind::BaseShares),
                        ReferenceKind::Named,
                    )
                    .dep(
                        "{pro_rata}",
                        SymbolKey::aggregate(&round.name, AggregateKind::ProRataShares),
                        ReferenceKind::Named,
                    )
                    .dep(
                        "{anti_dilution}",
                        SymbolKey::aggregate(&round.name, AggregateKind::AntiDilutionShares),
                        ReferenceKind::Named,
                    );
                CellContent::Formula(resolve_encoding(&encoding, &self.registry, &ctx)?)
            }
        };

        Ok(content)
    }

    /// The round's price-per-share cell.
    ///
    /// An explicit document price always wins. Otherwise the price derives
    /// from the calculation type; note and SAFE rounds carry the last priced
    /// round's price as their reference price (instruments apply their own
    /// discount/cap on top).
    fn price_content(
        &self,
        index: usize,
        round: &Round,
        ctx: &ResolveContext,
    ) -> AssemblyResult<CellContent> {
        if let Some(price) = round.price_per_share {
            return Ok(CellContent::Number(price));
        }

        let encoding = match round.calculation_type {
            CalculationType::ValuationBased => FormulaEncoding::new("{valuation}/{pre}")
                .dep(
                    "{valuation}",
                    SymbolKey::aggregate(&round.name, AggregateKind::PreMoneyValuation),
                    ReferenceKind::Named,
                )
                .dep(
                    "{pre}",
                    SymbolKey::aggregate(&round.name, AggregateKind::PreRoundShares),
                    ReferenceKind::Named,
                ),
            CalculationType::FixedShares | CalculationType::TargetPercentage => {
                FormulaEncoding::new("{money}/{base}")
                    .dep(
                        "{money}",
                        SymbolKey::aggregate(&round.name, AggregateKind::NewMoney),
                        ReferenceKind::Named,
                    )
                    .dep(
                        "{base}",
                        SymbolKey::aggregate(&round.name, AggregateKind::BaseShares),
                        ReferenceKind::Named,
                    )
            }
            CalculationType::Convertible | CalculationType::Safe => {
                match self.last_priced_round(index) {
                    Some(prev) => FormulaEncoding::new("{price}").dep(
                        "{price}",
                        SymbolKey::aggregate(&prev.name, AggregateKind::PricePerShare),
                        ReferenceKind::Named,
                    ),
                    // Nothing priced yet: instruments fall back to their caps
                    None => return Ok(CellContent::Number(Decimal::ZERO)),
                }
            }
        };

        Ok(CellContent::Formula(resolve_encoding(
            &encoding,
            &self.registry,
            ctx,
        )?))
    }

    /// The last round before `index` that set a real price
    fn last_priced_round(&self, index: usize) -> Option<&Round> {
        self.doc.rounds[..index]
            .iter()
            .rev()
            .find(|r| r.calculation_type.is_priced())
    }

    // === Instrument rows ===

    fn emit_instrument_row(
        &self,
        index: usize,
        round: &Round,
        instrument: &Instrument,
        row: u32,
        sheet: &mut CompiledSheet,
    ) -> AssemblyResult<()> {
        sheet.set(
            CellAddress::new(row, COL_HOLDER),
            CellContent::Text(instrument.holder.clone()),
        );
        sheet.set(
            CellAddress::new(row, COL_CLASS),
            CellContent::Text(instrument.class.clone()),
        );

        let kind_tag = match &instrument.kind {
            InstrumentKind::Primary { .. } => "primary",
            InstrumentKind::ProRata { .. } => "pro_rata",
            InstrumentKind::AntiDilution { .. } => "anti_dilution",
        };
        sheet.set(
            CellAddress::new(row, COL_KIND),
            CellContent::Text(kind_tag.to_string()),
        );

        // HeldBefore: the holder's cumulative shares from all earlier rounds
        let held_content = if index == 0 {
            CellContent::Number(Decimal::ZERO)
        } else {
            let range = self.holdings_row_range(&instrument.holder, index, round)?;
            CellContent::Formula(format!("={}", sum(&range)))
        };
        sheet.set(CellAddress::new(row, COL_HELD), held_content);

        match &instrument.kind {
            InstrumentKind::Primary {
                investment_amount,
                shares,
                target_percentage,
                discount_rate,
                valuation_cap,
            } => {
                if let Some(amount) = investment_amount {
                    sheet.set(CellAddress::new(row, COL_AMOUNT), CellContent::Number(*amount));
                }
                if let Some(target) = target_percentage {
                    sheet.set(CellAddress::new(row, COL_TARGET), CellContent::Number(*target));
                }
                let content = self.primary_shares_content(
                    round,
                    row,
                    *shares,
                    *discount_rate,
                    *valuation_cap,
                )?;
                sheet.set(CellAddress::new(row, COL_SHARES), content);
            }

            InstrumentKind::ProRata {
                pro_rata_type,
                target_percentage,
            } => {
                let refs = self.aggregate_refs(round)?;
                let held_ref = self.current_row_ref(round, "HeldBefore", row)?;

                let formula = match (pro_rata_type, target_percentage) {
                    (ProRataType::Super, Some(target)) => {
                        sheet.set(
                            CellAddress::new(row, COL_TARGET),
                            CellContent::Number(*target),
                        );
                        sheet.set(
                            CellAddress::new(row, COL_RIGHTS),
                            CellContent::Text("super".to_string()),
                        );
                        super_allocation_formula(&refs, &target.to_string(), &held_ref)
                    }
                    (ProRataType::Super, None) | (ProRataType::Standard, _) => {
                        if matches!(pro_rata_type, ProRataType::Super) {
                            log::warn!(
                                "super pro-rata instrument '{}' (round '{}', holder '{}') has no \
                                 target_percentage; treating as standard",
                                instrument.id,
                                round.name,
                                instrument.holder
                            );
                        }
                        // Standard: the target column mirrors the implicit
                        // target so the rights-group sums stay live
                        sheet.set(
                            CellAddress::new(row, COL_TARGET),
                            CellContent::Formula(ensure_division_guard(&format!(
                                "={}/{}",
                                held_ref, refs.pre_round
                            ))),
                        );
                        sheet.set(
                            CellAddress::new(row, COL_RIGHTS),
                            CellContent::Text("standard".to_string()),
                        );
                        standard_allocation_formula(&refs, &held_ref)
                    }
                };
                sheet.set(CellAddress::new(row, COL_SHARES), CellContent::Formula(formula));
            }

            InstrumentKind::AntiDilution {
                dilution_method,
                original_round,
            } => {
                let refs = self.anti_dilution_refs(
                    index,
                    round,
                    instrument,
                    original_round.as_deref(),
                )?;
                sheet.set(
                    CellAddress::new(row, COL_SHARES),
                    CellContent::Formula(additional_shares_formula(*dilution_method, &refs)),
                );
            }
        }

        Ok(())
    }

    /// The shares cell for a primary investment, by calculation type
    fn primary_shares_content(
        &self,
        round: &Round,
        row: u32,
        shares: Option<u64>,
        discount_rate: Option<Decimal>,
        valuation_cap: Option<Decimal>,
    ) -> AssemblyResult<CellContent> {
        let content = match round.calculation_type {
            CalculationType::FixedShares => {
                CellContent::Number(Decimal::from(shares.unwrap_or(0)))
            }

            CalculationType::ValuationBased => {
                let amount = self.current_row_ref(round, "Amount", row)?;
                let price = self.named(round, AggregateKind::PricePerShare)?;
                CellContent::Formula(ensure_division_guard(&format!(
                    "={}",
                    round_expr(&format!("{}/{}", amount, price), 0)
                )))
            }

            CalculationType::TargetPercentage => {
                // Targets hold simultaneously: each row takes its fraction of
                // the solved base total, with the target sum read live from
                // the table
                let target = self.current_row_ref(round, "Target", row)?;
                let pre = self.named(round, AggregateKind::PreRoundShares)?;
                let target_sum = sumif(
                    &self.column_ref(round, "Kind")?,
                    &text_literal("primary"),
                    &self.column_ref(round, "Target")?,
                );
                let base_total = format!(
                    "{}/{}",
                    pre,
                    paren(&format!("1-{}", min(&target_sum, OVERSUBSCRIPTION_CAP)))
                );
                CellContent::Formula(ensure_division_guard(&format!(
                    "={}",
                    round_expr(&format!("{}*{}", target, paren(&base_total)), 0)
                )))
            }

            CalculationType::Convertible | CalculationType::Safe => {
                let amount = self.current_row_ref(round, "Amount", row)?;
                let conversion = self.conversion_price_expr(round, discount_rate, valuation_cap)?;
                CellContent::Formula(ensure_division_guard(&format!(
                    "={}",
                    round_expr(&format!("{}/{}", amount, paren(&conversion)), 0)
                )))
            }
        };

        Ok(content)
    }

    /// Conversion price for a note/SAFE: the lower of the cap-implied price
    /// and the discounted reference price, whichever terms the instrument
    /// carries.
    fn conversion_price_expr(
        &self,
        round: &Round,
        discount_rate: Option<Decimal>,
        valuation_cap: Option<Decimal>,
    ) -> AssemblyResult<String> {
        let reference_price = self.named(round, AggregateKind::PricePerShare)?;
        let pre = self.named(round, AggregateKind::PreRoundShares)?;

        let cap_term = valuation_cap.map(|cap| paren(&format!("{}/{}", cap, pre)));
        let discount_term =
            discount_rate.map(|d| format!("{}*{}", reference_price, paren(&format!("1-{}", d))));

        let expr = match (cap_term, discount_term) {
            (Some(cap), Some(discount)) => min(&cap, &discount),
            (Some(cap), None) => cap,
            (None, Some(discount)) => discount,
            (None, None) => reference_price,
        };

        Ok(expr)
    }

    // === Anti-dilution ===

    /// Build the reference set for one anti-dilution adjustment.
    ///
    /// The original round is the explicit `original_round` when present.
    /// Falling back to the immediately preceding round is a documented
    /// approximation: for rights granted more than one round back it
    /// understates the baseline, so the fallback is logged.
    fn anti_dilution_refs(
        &self,
        index: usize,
        round: &Round,
        instrument: &Instrument,
        original_round: Option<&str>,
    ) -> AssemblyResult<AntiDilutionRefs> {
        let original = match original_round {
            Some(name) => name.to_string(),
            None => {
                if index == 0 {
                    return Err(AssemblyError::MissingOriginalRound {
                        round: round.name.clone(),
                        holder: instrument.holder.clone(),
                    });
                }
                let prev = &self.doc.rounds[index - 1].name;
                log::warn!(
                    "anti-dilution instrument '{}' (round '{}', holder '{}') has no \
                     original_round; falling back to previous round '{}'",
                    instrument.id,
                    round.name,
                    instrument.holder,
                    prev
                );
                prev.clone()
            }
        };

        let original_index = self
            .doc
            .rounds
            .iter()
            .position(|r| sanitize_name(&r.name) == sanitize_name(&original))
            .ok_or_else(|| CoreError::RoundNotFound(original.clone()))?;

        let first_round = &self.doc.rounds[0];
        let holder = &instrument.holder;

        let original_round_ref = &self.doc.rounds[original_index];
        let pre = self.named(round, AggregateKind::PreRoundShares)?;
        let founders = aggregate_name(&first_round.name, AggregateKind::IssuedShares);

        Ok(AntiDilutionRefs {
            original_price: self.named(original_round_ref, AggregateKind::PricePerShare)?,
            original_shares: self.holdings_cell_ref(holder, original_index, round)?,
            original_investment: sumif(
                &self.column_ref(original_round_ref, "Holder")?,
                &text_literal(holder),
                &self.column_ref(original_round_ref, "Amount")?,
            ),
            original_pre_round: self.named(original_round_ref, AggregateKind::PreRoundShares)?,
            original_issued: self.named(original_round_ref, AggregateKind::IssuedShares)?,
            current_price: self.named(round, AggregateKind::PricePerShare)?,
            broad_base: pre.clone(),
            // Narrow base: outstanding minus founder stock, the first round's
            // issuance standing in for the common pool
            narrow_base: paren(&format!("{}-{}", pre, founders)),
            new_money: self.named(round, AggregateKind::NewMoney)?,
            new_shares: self.named(round, AggregateKind::BaseShares)?,
            current_base: self.named(round, AggregateKind::BaseShares)?,
            current_pre_round: pre,
            prior_grants: self.prior_grants_expr(index, holder, round)?,
        })
    }

    /// Sum of the holder's anti-dilution grants from every earlier round:
    /// one `SUMIFS` per prior table, chained with `+`, or a literal `0`.
    fn prior_grants_expr(
        &self,
        index: usize,
        holder: &str,
        round: &Round,
    ) -> AssemblyResult<String> {
        let mut terms = Vec::new();
        for prior in &self.doc.rounds[..index] {
            terms.push(sumifs(
                &self.column_ref_in(prior, round, "Shares")?,
                &[
                    (&self.column_ref_in(prior, round, "Holder")?, &text_literal(holder)),
                    (&self.column_ref_in(prior, round, "Kind")?, &text_literal("anti_dilution")),
                ],
            ));
        }

        Ok(if terms.is_empty() {
            "0".to_string()
        } else {
            paren(&terms.join("+"))
        })
    }

    // === Holdings sheet ===

    fn assemble_holdings(&self) -> AssemblyResult<CompiledSheet> {
        let mut sheet = CompiledSheet::new(&self.holdings_sheet);

        sheet.set(CellAddress::new(0, 0), CellContent::Text("Holder".to_string()));
        for (k, round) in self.doc.rounds.iter().enumerate() {
            sheet.set(
                CellAddress::new(0, HOLDINGS_FIRST_COL + k as u16),
                CellContent::Text(round.name.clone()),
            );
        }
        let total_col = HOLDINGS_FIRST_COL + self.doc.rounds.len() as u16;
        sheet.set(
            CellAddress::new(0, total_col),
            CellContent::Text("Total".to_string()),
        );

        for (i, holder) in self.doc.holders.iter().enumerate() {
            let row = HOLDINGS_FIRST_ROW + i as u32;
            sheet.set(
                CellAddress::new(row, 0),
                CellContent::Text(holder.name.clone()),
            );

            for (k, round) in self.doc.rounds.iter().enumerate() {
                let formula = format!(
                    "={}",
                    sumif(
                        &self.column_ref(round, "Holder")?,
                        &text_literal(&holder.name),
                        &self.column_ref(round, "Shares")?,
                    )
                );
                sheet.set(
                    CellAddress::new(row, HOLDINGS_FIRST_COL + k as u16),
                    CellContent::Formula(formula),
                );
            }

            if !self.doc.rounds.is_empty() {
                let range = CellRange::absolute(row, HOLDINGS_FIRST_COL, row, total_col - 1);
                sheet.set(
                    CellAddress::new(row, total_col),
                    CellContent::Formula(format!("={}", sum(&range.to_a1_string()))),
                );
            }
        }

        Ok(sheet)
    }

    // === Reference helpers ===

    /// The resolved aggregate references the allocation engine consumes
    fn aggregate_refs(&self, round: &Round) -> AssemblyResult<AggregateRefs> {
        Ok(AggregateRefs {
            pre_round: self.named(round, AggregateKind::PreRoundShares)?,
            base_shares: self.named(round, AggregateKind::BaseShares)?,
            standard_target_sum: self.named(round, AggregateKind::ProRataTargetSum)?,
            super_target_sum: self.named(round, AggregateKind::SuperTargetSum)?,
            standard_held_sum: self.named(round, AggregateKind::ProRataHeldSum)?,
            super_held_sum: self.named(round, AggregateKind::SuperHeldSum)?,
            new_total: self.named(round, AggregateKind::NewTotalShares)?,
        })
    }

    /// A round aggregate's defined-name reference
    fn named(&self, round: &Round, kind: AggregateKind) -> AssemblyResult<String> {
        let resolver = Resolver::new(&self.registry);
        Ok(resolver.resolve(
            &SymbolKey::aggregate(&round.name, kind),
            ReferenceKind::Named,
            &ResolveContext::round(&round.name),
        )?)
    }

    /// A whole-column reference into a round's own instrument table
    fn column_ref(&self, round: &Round, column: &str) -> AssemblyResult<String> {
        self.column_ref_in(round, round, column)
    }

    /// A whole-column reference into `table_round`'s instrument table, from a
    /// formula being compiled for `at_round`
    fn column_ref_in(
        &self,
        table_round: &Round,
        at_round: &Round,
        column: &str,
    ) -> AssemblyResult<String> {
        let resolver = Resolver::new(&self.registry);
        Ok(resolver.resolve(
            &SymbolKey::column(&table_round.name, column),
            ReferenceKind::Structured,
            &ResolveContext::round(&at_round.name),
        )?)
    }

    /// A current-row reference within a round's instrument table. Falls back
    /// to a local absolute cell address when structured references are off.
    fn current_row_ref(&self, round: &Round, column: &str, row: u32) -> AssemblyResult<String> {
        if self.options.structured_refs {
            let resolver = Resolver::new(&self.registry);
            Ok(resolver.resolve(
                &SymbolKey::column(&round.name, column),
                ReferenceKind::Structured,
                &ResolveContext::round(&round.name).current_row(),
            )?)
        } else {
            let col = TABLE_COLUMNS
                .iter()
                .position(|c| *c == column)
                .expect("known column") as u16;
            Ok(CellAddress::absolute(row, col).to_a1_string())
        }
    }

    /// The holder's holdings cell for one round, e.g. `Holdings!$C$2`
    fn holdings_cell_ref(
        &self,
        holder: &str,
        round_index: usize,
        at_round: &Round,
    ) -> AssemblyResult<String> {
        let row = self.holdings_row(holder, at_round)?;
        let addr = CellAddress::absolute(row, HOLDINGS_FIRST_COL + round_index as u16);
        Ok(format!("{}!{}", self.holdings_sheet, addr))
    }

    /// The holder's holdings range covering all rounds before `before_index`
    fn holdings_row_range(
        &self,
        holder: &str,
        before_index: usize,
        at_round: &Round,
    ) -> AssemblyResult<String> {
        let row = self.holdings_row(holder, at_round)?;
        let range = CellRange::absolute(
            row,
            HOLDINGS_FIRST_COL,
            row,
            HOLDINGS_FIRST_COL + before_index as u16 - 1,
        );
        Ok(format!("{}!{}", self.holdings_sheet, range))
    }

    fn holdings_row(&self, holder: &str, at_round: &Round) -> AssemblyResult<u32> {
        let location = self
            .registry
            .lookup(&SymbolKey::holding(holder))
            .map_err(|source| FormulaError::Reference {
                context: ResolveContext::cell(&at_round.name, holder),
                source,
            })?;
        let addr = location
            .as_cell()
            .expect("holdings rows register as cells");
        Ok(addr.row)
    }
}

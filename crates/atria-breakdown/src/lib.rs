pub mod calculator;

pub use calculator::{
    BreakdownError, CalcOptions, CostBreakdownCalculator, OveragePolicy, SplitAmounts,
};

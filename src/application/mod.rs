//! Application layer: wires external collaborators (rule and option
//! providers, event sinks) to the engine and drives the match-and-start
//! cycle for a document.

pub mod controller;

pub use controller::{
    OptionsProvider, PagerController, RuleProvider, StaticRuleProvider, TargetWindowRewriter,
};

//! Scenario and property tests across components

mod distribution_flow_tests;
mod selection_property_tests;

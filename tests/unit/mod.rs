// Unit tests for mailaccount
// This module organizes all unit tests

pub mod account;
pub mod observation;

//! Features that live only in the local store.

pub mod notes;
pub mod onboarding;
pub mod selected_city;

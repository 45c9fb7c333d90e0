pub mod archetypes;
pub mod ask;
pub mod council;
pub mod doctor;
pub mod onboard;

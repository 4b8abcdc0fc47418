pub mod access;
pub mod answer;
pub mod exam;
pub mod score;

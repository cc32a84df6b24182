#[cfg(feature = "gym")]
pub mod cart_pole;
pub mod k_armed_bandit;

#[cfg(feature = "gym")]
pub use cart_pole::CartPole;
pub use k_armed_bandit::KArmedBandit;

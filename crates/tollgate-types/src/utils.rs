//! Utility functions

use rand::RngExt;

pub const SAFE: [char; 62] = [
	'0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
	'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B',
	'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U',
	'V', 'W', 'X', 'Y', 'Z',
];

/// Random alphanumeric string of `len` characters
pub fn random_id(len: usize) -> String {
	let mut rng = rand::rng();
	let mut result = String::with_capacity(len);

	for _ in 0..len {
		result.push(SAFE[rng.random_range(0..SAFE.len())]);
	}
	result
}

/// Splits a comma-separated list, trimming entries and dropping empty ones
pub fn split_list(value: &str) -> Vec<Box<str>> {
	value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(Box::from).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_random_id() {
		let a = random_id(8);
		let b = random_id(8);
		assert_eq!(a.len(), 8);
		assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
		assert_ne!(a, b);
	}

	#[test]
	fn test_split_list() {
		assert_eq!(split_list("a.com, b.com,,"), vec![Box::from("a.com"), Box::from("b.com")]);
		assert!(split_list("").is_empty());
		assert!(split_list(" , ").is_empty());
	}
}

// vim: ts=4

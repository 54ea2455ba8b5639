// Explanations for panic messages raised by the standard library itself

struct Hint {
    needle: &'static str,
    explanation: &'static str,
}

const HINTS: &[Hint] = &[
    Hint {
        needle: "index out of bounds",
        explanation: "You tried to access an element past the end of a slice or vector. \
Indices start at 0, so the last valid index is `len() - 1`.",
    },
    Hint {
        needle: "attempt to divide by zero",
        explanation: "A division by zero happened. Check the divisor before dividing.",
    },
    Hint {
        needle: "attempt to calculate the remainder with a divisor of zero",
        explanation: "A remainder (`%`) by zero happened. Check the divisor first.",
    },
    Hint {
        needle: "with overflow",
        explanation: "An arithmetic operation produced a value that doesn't fit in its integer type. \
Use a wider type, or `checked_*`/`wrapping_*`/`saturating_*` operations.",
    },
    Hint {
        needle: "called `Option::unwrap()` on a `None` value",
        explanation: "`unwrap()` was called on an `Option` that was `None`. \
Handle the `None` case with `match`, `if let` or `unwrap_or`.",
    },
    Hint {
        needle: "called `Result::unwrap()` on an `Err` value",
        explanation: "`unwrap()` was called on a `Result` that was an `Err`. \
Handle the error case instead of assuming success.",
    },
    Hint {
        needle: "is not a char boundary",
        explanation: "A string was sliced in the middle of a multi-byte character. \
Iterate with `chars()` or `char_indices()` instead of byte offsets.",
    },
    Hint {
        needle: "already borrowed",
        explanation: "A `RefCell` was borrowed mutably while another borrow was still alive.",
    },
    Hint {
        needle: "already mutably borrowed",
        explanation: "A `RefCell` was borrowed while a mutable borrow was still alive.",
    },
    Hint {
        needle: "capacity overflow",
        explanation: "A collection was asked to grow beyond what memory allows. \
Check for a loop that keeps pushing elements.",
    },
];

/// Explanation of a well-known standard library panic message, if any
pub fn hint_for(message: &str) -> Option<&'static str> {
    HINTS
        .iter()
        .find(|hint| message.contains(hint.needle))
        .map(|hint| hint.explanation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_messages() {
        assert!(hint_for("index out of bounds: the len is 3 but the index is 3")
            .unwrap()
            .contains("past the end"));
        assert!(hint_for("attempt to add with overflow").is_some());
        assert!(hint_for("called `Option::unwrap()` on a `None` value")
            .unwrap()
            .contains("None"));
    }

    #[test]
    fn test_unknown_message() {
        assert_eq!(hint_for("bad"), None);
    }
}

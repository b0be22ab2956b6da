//! CLI Exit Code Registry
//!
//! Single source of truth for `smeta` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                         |
//! |------|-------------------------------------------------|
//! | 0    | Success (skipped documents do not fail a run)   |
//! | 1    | General error (unreadable input, bad document)  |
//! | 2    | Usage error (bad arguments, missing file)       |
//! | 3    | Configuration file unreadable or invalid        |
//! | 4    | Corpus contained no documents                   |
//! | 5    | A requested report could not be written         |

/// Success - run completed, possibly with skipped documents.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments or a missing input file.
pub const EXIT_USAGE: u8 = 2;

/// Config file missing, unparseable, or rejected by validation.
pub const EXIT_CONFIG: u8 = 3;

/// No `.gge` documents below the input directory.
pub const EXIT_NO_DOCUMENTS: u8 = 4;

/// Combined report or LSR summary could not be written.
pub const EXIT_WRITE: u8 = 5;

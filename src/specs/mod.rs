// src/specs/mod.rs
//! # Source “specs” module
//!
//! Static descriptions of **where each category lives on the wiki** and what to ask
//! for. Adapters read these; they never hard-code table names or page titles.
//!
//! ## What lives here
//! - **Cargo specs** (`cargo`): Cargo table, field list (with aliases such as
//!   `_pageName=Page` so rows come back keyed by the identity fields), optional
//!   `where` clause and page size.
//! - **Page specs** (`pages`): wiki pages to scrape for a category, the table class
//!   to look for, and how column headers map onto record fields.
//!
//! ## What does **not** live here
//! - **Network I/O or retries** – that is `source` and `router`.
//! - **Type coercion / identity checks** – that is `normalize`, driven by
//!   `DomainCategory`.
//!
//! ## Conventions & invariants
//! - The identity fields of a category (see `DomainCategory::identity_fields`) must
//!   be produced by both the cargo spec and, when present, the page spec, so both
//!   adapters satisfy the same record contract.
//! - Not every category has a page spec. A scrape source configured for such a
//!   category rejects immediately instead of guessing.
//!
//! In short: **`specs` knows where the data is.** Other layers decide when to fetch,
//! how to cache, and what to do when a source fails.
pub mod cargo;
pub mod pages;

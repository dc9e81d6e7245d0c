// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers for one CLI command. No tensor
// math and no printing here: this layer loads splits, builds the
// task from a checkpoint and hands off to the ml layer.
//
// Reference: Clean Architecture pattern

/// The training workflow and its configuration
pub mod train_use_case;

/// The validate / predict workflows
pub mod eval_use_case;

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module — decode embedded PDF images, crop and scale them, and turn
// them back into PDF image XObjects.

pub mod processor;

pub use processor::ImageProcessor;

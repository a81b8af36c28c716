// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod code_generator;
pub mod llm_service;
pub mod repair_loop;
pub mod result_normalizer;

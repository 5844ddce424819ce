// ABOUTME: Unit tests for the stockboard server library
// ABOUTME: Environment configuration and maintenance commands

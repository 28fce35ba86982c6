pub mod sink_tests;

mod concurrent_test;
mod fixture_suite_test;
mod info_server_test;
mod lifecycle_test;
mod table_data_test;

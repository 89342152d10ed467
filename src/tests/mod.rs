mod http_transport_tests;
